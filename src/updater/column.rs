use anyhow::{Result, anyhow, bail};

/// Index of `XFD`, the last column an xlsx sheet can hold.
pub const MAX_COLUMN: u32 = 16_384;

/// Converts a column letter (`A`, `m`, `AA`) into its 1-based index.
pub fn column_index(letters: &str) -> Result<u32> {
    let letters = letters.trim();
    if letters.is_empty() {
        bail!("Column letter is empty");
    }

    letters.chars().try_fold(0u32, |index, ch| {
        if !ch.is_ascii_alphabetic() {
            bail!("Invalid column letter: '{letters}'");
        }
        let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .filter(|i| *i <= MAX_COLUMN)
            .ok_or_else(|| anyhow!("Column out of range: '{letters}' (last column is XFD)"))
    })
}
