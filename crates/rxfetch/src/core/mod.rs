//! Pure transformations: validation rules, parameter placement and body
//! serialization. No I/O happens here.

mod encoding;
mod serializer;
mod validation;

pub use encoding::{ParameterPlacement, placement};
pub use serializer::{
    DataSerializer, DecodableSerializer, EMPTY_RESPONSE_CODES, JsonSerializer, ResponseSerializer,
    StringSerializer, allows_empty_body,
};
pub use validation::{accept_types, validate, validate_content_type, validate_status};
