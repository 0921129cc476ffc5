use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// Nothing usable was submitted.
    #[error("Falta el número de teléfono")]
    Missing,

    /// The formatted number is shorter than prefix + subscriber digits.
    #[error("Número de teléfono inválido")]
    TooShort { digits: usize },
}
