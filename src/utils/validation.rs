use std::path::Path;
use crate::core::ImageDescriptor;
use crate::utils::{PipelineError, PipelineResult};

/// Validates an image descriptor before a run is prepared.
///
/// Only the source file is checked. An unknown media type is not an error
/// here: it surfaces later as a failure of each step.
pub fn validate_descriptor(image: &ImageDescriptor) -> PipelineResult<()> {
    validate_input_path(&image.source_path)
}

/// Validates that the input path exists and is a regular file
pub fn validate_input_path(path: &Path) -> PipelineResult<()> {
    if !path.exists() {
        return Err(PipelineError::setup(
            format!("Input file does not exist: {}", path.display())
        ));
    }

    if !path.is_file() {
        return Err(PipelineError::setup(
            format!("Input path is not a file: {}", path.display())
        ));
    }

    Ok(())
}
