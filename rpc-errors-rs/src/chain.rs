//! # Failure Chain Flattening
//!
//! Converts a failure and its causes into the flat record list returned by
//! `FetchErrorDetails`. Records reference their cause by index instead of
//! nesting, and the list is capped at [`MAX_ERROR_CHAIN_LENGTH`] entries.

use std::collections::HashMap;

use crate::failure::Failure;
use crate::hierarchy;
use crate::proto::fetch_error_details_response::{
    Error as ErrorRecord, StackTraceElement, StructuredError,
};
use crate::proto::FetchErrorDetailsResponse;

/// Maximum number of records in a flattened chain
pub const MAX_ERROR_CHAIN_LENGTH: usize = 5;

/// Flattens `failure` and up to four of its causes.
///
/// When the chain is longer than the cap, the last record carries no
/// `cause_idx` even though its failure has a cause.
pub fn flatten(failure: &Failure, include_stack_trace: bool) -> FetchErrorDetailsResponse {
    let mut errors: Vec<ErrorRecord> = Vec::new();
    let mut current = Some(failure);

    while let Some(failure) = current {
        if errors.len() >= MAX_ERROR_CHAIN_LENGTH {
            break;
        }

        let mut record = ErrorRecord {
            error_type_hierarchy: hierarchy::resolve_names(Some(failure.class())),
            message: failure.message().map(str::to_string),
            ..Default::default()
        };

        if include_stack_trace {
            record.stack_trace = failure
                .stack_trace()
                .iter()
                .map(|frame| StackTraceElement {
                    declaring_class: frame.declaring_type.clone(),
                    method_name: frame.method_name.clone(),
                    file_name: frame.file_name.clone(),
                    line_number: frame.line_number,
                })
                .collect();
        }

        if let Some(structured) = failure.structured() {
            record.structured_error = Some(StructuredError {
                error_class: structured.error_class.clone(),
                message_parameters: structured
                    .message_parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<_, _>>(),
            });
        }

        if errors.len() + 1 < MAX_ERROR_CHAIN_LENGTH && failure.cause().is_some() {
            record.cause_idx = Some((errors.len() + 1) as i32);
        }

        errors.push(record);
        current = failure.cause().map(|cause| cause.as_ref());
    }

    FetchErrorDetailsResponse {
        root_error_idx: Some(0),
        errors,
    }
}
