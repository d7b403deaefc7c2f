pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{PipelineError, PipelineResult, StepError};
pub use validation::{validate_descriptor, validate_input_path};
pub use formats::{MediaFamily, family_from_extension};
pub use fs::{
    get_file_size,
    working_copy_path,
    scratch_path,
    create_working_copy,
    parent_dir,
};
