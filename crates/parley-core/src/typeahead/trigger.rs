/// An `@` mention being typed at the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionTrigger<'a> {
    /// Byte offset of the `@`.
    pub at: usize,
    /// Everything after the `@` up to the end of the input.
    pub partial: &'a str,
}

/// Finds the mention trigger for `input`, if any.
///
/// Only the last `@` is considered. It starts a mention when it is the first
/// character or directly follows a space; any other character in front of it
/// (`x@y`, `foo\t@bar`) leaves the typeahead inactive.
pub fn detect_mention(input: &str) -> Option<MentionTrigger<'_>> {
    let at = input.rfind('@')?;
    if at > 0 && input.as_bytes()[at - 1] != b' ' {
        return None;
    }

    Some(MentionTrigger {
        at,
        partial: &input[at + 1..],
    })
}

/// Replaces everything from the last `@` to the end of `input` with
/// `@<username> `. Returns `None` when the input has no `@` at all.
pub fn splice_mention(input: &str, username: &str) -> Option<String> {
    let at = input.rfind('@')?;
    Some(format!("{}@{username} ", &input[..at]))
}
