use crate::types::CommandCode;

/// Check whether the input already is a literal IRCC control code
///
/// Literal codes are exactly 20 characters: five leading `A`s, thirteen
/// alphanumerics, and a trailing `==`. Anything else is treated as a command
/// name to resolve against the device's table.
pub(crate) fn is_literal_code(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() == 20
        && bytes[..5].iter().all(|&b| b == b'A')
        && bytes[5..18].iter().all(|b| b.is_ascii_alphanumeric())
        && &bytes[18..] == b"=="
}

/// The device's remote-controller code table, fetched once per client
#[derive(Debug, Clone)]
pub(crate) struct CommandTable {
    codes: Vec<CommandCode>,
}

impl CommandTable {
    pub fn new(codes: Vec<CommandCode>) -> Self {
        Self { codes }
    }

    /// Exact, case-sensitive name lookup
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.codes
            .iter()
            .find(|code| code.name == name)
            .map(|code| code.value.as_str())
    }
}
