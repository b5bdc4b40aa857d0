use reqwest::Method;

use crate::data::ParameterEncoding;

/// Where encoded parameters end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterPlacement {
    QueryString,
    FormBody,
    JsonBody,
}

/// Decide where parameters go for a method and encoding.
pub fn placement(method: &Method, encoding: ParameterEncoding) -> ParameterPlacement {
    match encoding {
        ParameterEncoding::QueryString => ParameterPlacement::QueryString,
        ParameterEncoding::Json => ParameterPlacement::JsonBody,
        ParameterEncoding::Url => {
            if *method == Method::GET || *method == Method::HEAD || *method == Method::DELETE {
                ParameterPlacement::QueryString
            } else {
                ParameterPlacement::FormBody
            }
        }
    }
}
