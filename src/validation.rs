use validator::Validate;

use crate::error::AppError;

pub trait ValidateExt {
    fn check(&self) -> Result<(), AppError>;
}

impl<T: Validate> ValidateExt for T {
    fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))
    }
}
