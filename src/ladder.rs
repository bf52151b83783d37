/// The fixed penalty ladder. A participant who collects the full word is out.
pub const LADDER: &str = "SKATE";

/// Appends the next ladder letter to `current`. Saturates at the full word,
/// so concurrent double-increments can never overshoot.
pub fn add_letter(current: &str) -> String {
    match LADDER.as_bytes().get(current.len()) {
        Some(&next) => {
            let mut out = String::with_capacity(current.len() + 1);
            out.push_str(current);
            out.push(next as char);
            out
        }
        None => current.to_owned(),
    }
}

pub fn is_eliminated(letters: &str) -> bool {
    letters == LADDER
}
