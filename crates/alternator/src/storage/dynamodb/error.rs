//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `alternator_core`. Errors are
//! classified, never retried.

use std::fmt::{Debug, Display};

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};

use alternator_core::StoreError;

/// Map any DynamoDB SDK error to StoreError.
pub fn map_sdk_error<E, R>(err: SdkError<E, R>, operation: &'static str) -> StoreError
where
    E: ProvideErrorMetadata + Debug + Display,
    R: Debug,
{
    match &err {
        SdkError::DispatchFailure(dispatch) if dispatch.is_timeout() => {
            StoreError::Connection(format!("{operation} timed out connecting to DynamoDB"))
        }
        SdkError::DispatchFailure(_) => StoreError::Connection(format!(
            "{operation} failed to reach DynamoDB. Check if the endpoint is reachable."
        )),
        SdkError::TimeoutError(_) => {
            StoreError::Connection(format!("{operation} timed out waiting for DynamoDB"))
        }
        SdkError::ServiceError(service) => {
            let service_err = service.err();
            map_error_code(
                service_err.code(),
                service_err.message(),
                &service_err.to_string(),
                operation,
            )
        }
        other => StoreError::Service(format!("{operation} failed: {:?}", other)),
    }
}

/// Map a DynamoDB error code and message to StoreError.
pub fn map_error_code(
    code: Option<&str>,
    message: Option<&str>,
    display: &str,
    operation: &'static str,
) -> StoreError {
    let message = message.unwrap_or(display).to_string();

    match code {
        Some("ResourceNotFoundException") => StoreError::ResourceNotFound(message),
        Some("ResourceInUseException") => StoreError::ResourceInUse(message),
        Some("ConditionalCheckFailedException") => StoreError::ConditionalCheckFailed(message),
        Some("ValidationException") | Some("SerializationException") => {
            StoreError::Validation(message)
        }
        Some(
            "ProvisionedThroughputExceededException"
            | "LimitExceededException"
            | "RequestLimitExceeded"
            | "ThrottlingException",
        ) => StoreError::Throughput(message),
        Some(code) => StoreError::Service(format!("{operation} failed ({code}): {message}")),
        None => StoreError::Service(format!("{operation} failed: {message}")),
    }
}
