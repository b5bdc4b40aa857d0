use crate::data::Validation;
use crate::error::ValidationFailure;

/// Check a status code against a list of acceptable codes.
///
/// An empty list accepts everything.
pub fn validate_status(status: u16, acceptable: &[u16]) -> Result<(), ValidationFailure> {
    if acceptable.is_empty() || acceptable.contains(&status) {
        Ok(())
    } else {
        Err(ValidationFailure::StatusCode(status))
    }
}

/// Check a `Content-Type` header against acceptable MIME types.
///
/// Parameters such as `charset` are ignored. A missing header only passes
/// when `*/*` is acceptable, or when the list is empty.
pub fn validate_content_type(
    content_type: Option<&str>,
    acceptable: &[String],
) -> Result<(), ValidationFailure> {
    if acceptable.is_empty() {
        return Ok(());
    }

    let fail = || ValidationFailure::ContentType {
        actual: content_type.map(str::to_string),
        acceptable: acceptable.to_vec(),
    };

    let Some(actual) = content_type.and_then(parse_mime) else {
        return if acceptable.iter().any(|a| a.trim() == "*/*") {
            Ok(())
        } else {
            Err(fail())
        };
    };

    let matched = acceptable
        .iter()
        .filter_map(|a| parse_mime(a))
        .any(|expected| mime_matches(expected, actual));

    if matched { Ok(()) } else { Err(fail()) }
}

/// Acceptable types derived from an `Accept` header value.
///
/// Quality parameters are dropped; `None` when the header is absent.
pub fn accept_types(accept: Option<&str>) -> Vec<String> {
    accept
        .map(|value| {
            value
                .split(',')
                .filter_map(|part| part.split(';').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Run every rule of `validation`.
///
/// `accept` is the request's `Accept` header, used when the validation does
/// not list content types itself.
pub fn validate(
    validation: &Validation,
    status: u16,
    content_type: Option<&str>,
    accept: Option<&str>,
) -> Result<(), ValidationFailure> {
    validate_status(status, &validation.status_codes)?;

    match &validation.content_types {
        Some(types) => validate_content_type(content_type, types),
        None => validate_content_type(content_type, &accept_types(accept)),
    }
}

fn parse_mime(value: &str) -> Option<(&str, &str)> {
    let essence = value.split(';').next()?.trim();
    let (ty, subtype) = essence.split_once('/')?;
    if ty.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((ty, subtype))
}

fn mime_matches(expected: (&str, &str), actual: (&str, &str)) -> bool {
    let part = |e: &str, a: &str| e == "*" || e.eq_ignore_ascii_case(a);
    part(expected.0, actual.0) && part(expected.1, actual.1)
}
