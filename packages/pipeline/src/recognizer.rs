use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::PipelineError;

/// Future returned by [`RecognitionPipeline::recognize`].
pub type PipelineFuture<'a> = Pin<Box<dyn Future<Output = Result<String, PipelineError>> + Send + 'a>>;

/// Speech recognition over one audio file.
///
/// `workdir` is a scratch directory owned by the caller and removed after
/// the call returns; implementations may put intermediate files there.
pub trait RecognitionPipeline: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Turn the audio at `audio` into text.
    fn recognize<'a>(&'a self, workdir: &'a Path, audio: &'a Path) -> PipelineFuture<'a>;
}
