//! Shell quoting for arguments interpolated into `sh -c` command lines

/// Quote `arg` so the shell passes it through as a single word.
///
/// Plain words made of `[A-Za-z0-9_./:=@%+-]` are returned unchanged.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:=@%+-".contains(c));
    if plain {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}
