pub mod backup;
pub mod test_mail;

use crate::error::{DupvaultError, EXIT_FAILURE};

pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DupvaultError>() {
        Some(err) => err.exit_code(),
        None => EXIT_FAILURE,
    }
}
