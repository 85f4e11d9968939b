use soapcall_util::Params;

/// A named remote procedure and its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub params: Params,
}

impl Operation {
    pub fn new<N: Into<String>, P: Into<Params>>(name: N, params: P) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
        }
    }
}

/// A request type that knows which operation it invokes.
///
/// ```
/// use soapcall::{Operation, SoapRequest};
///
/// struct CheckVat {
///     country_code: String,
///     vat_number: String,
/// }
///
/// impl SoapRequest for CheckVat {
///     fn build_operation(&self) -> Operation {
///         Operation::new(
///             "checkVat",
///             [
///                 ("countryCode", &self.country_code),
///                 ("vatNumber", &self.vat_number),
///             ],
///         )
///     }
/// }
/// ```
pub trait SoapRequest {
    fn build_operation(&self) -> Operation;
}

impl SoapRequest for Operation {
    fn build_operation(&self) -> Operation {
        self.clone()
    }
}
