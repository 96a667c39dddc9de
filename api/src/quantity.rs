use crate::errors::Error;

pub use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const BINARY_SUFFIXES: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SUFFIXES: [&str; 9] = ["n", "u", "m", "k", "M", "G", "T", "P", "E"];

/*
 * Checks `value` against the kubernetes quantity grammar and wraps it.
 *
 *   <quantity> ::= [+-]<number><suffix>
 *   <suffix>   ::= <binarySI> | <decimalSI> | e[+-]<digits> | E[+-]<digits>
 *
 * The string is kept as given, the API server does the normalisation.
 */
pub fn parse_quantity(value: &str) -> Result<Quantity, Error> {
    if !is_valid_quantity(value) {
	return Err(Error::Quantity(value.to_string()));
    }
    Ok(Quantity(value.to_string()))
}

fn is_valid_quantity(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let split = unsigned.find(|c: char| !(c.is_ascii_digit() || c == '.'))
	.unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);

    is_valid_number(number) && is_valid_suffix(suffix)
}

fn is_valid_number(number: &str) -> bool {
    number.chars().any(|c| c.is_ascii_digit()) && number.matches('.').count() <= 1
}

fn is_valid_suffix(suffix: &str) -> bool {
    if suffix.is_empty() || BINARY_SUFFIXES.contains(&suffix) || DECIMAL_SUFFIXES.contains(&suffix) {
	return true;
    }

    match suffix.strip_prefix(['e', 'E']) {
	Some(exponent) => {
	    let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
	    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
	},
	None => false,
    }
}
