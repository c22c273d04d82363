//! Access-control lists.
//!
//! Permissions travel on the wire as NUL-terminated segments of the form
//! `<perm_char><domid>`. The first segment names the owning domain and
//! the default permission granted to every other domain; subsequent
//! segments are per-domain overrides.
//!
//! The core parses and prints ACLs but never enforces them; they are
//! surfaced to callers as structured values.

/// A single domain's access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perm {
    /// No access (`n`).
    None,
    /// Read only (`r`).
    Read,
    /// Write only (`w`).
    Write,
    /// Read and write (`b`).
    ReadWrite,
}

impl Perm {
    /// The wire character for this permission.
    pub fn to_char(self) -> char {
        match self {
            Perm::None => 'n',
            Perm::Read => 'r',
            Perm::Write => 'w',
            Perm::ReadWrite => 'b',
        }
    }

    /// Decode a wire character; anything outside `{n, r, w, b}` is `None`.
    pub fn from_char(c: char) -> Option<Perm> {
        match c {
            'n' => Some(Perm::None),
            'r' => Some(Perm::Read),
            'w' => Some(Perm::Write),
            'b' => Some(Perm::ReadWrite),
            _ => None,
        }
    }
}

/// An access-control list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    /// The owning domain.
    pub owner: u32,
    /// Default permission for domains not listed in `acl`.
    pub other: Perm,
    /// Per-domain overrides.
    pub acl: Vec<(u32, Perm)>,
}

impl Acl {
    /// Parse the wire form.
    ///
    /// Splits on NUL, tolerating (and dropping) one trailing empty
    /// segment so both `r0\0w5\0` and `r0\0w5` parse identically.
    /// Returns `None` on empty input, a bad permission character, or a
    /// malformed domain id.
    pub fn parse(raw: &[u8]) -> Option<Acl> {
        let mut segments: Vec<&[u8]> = raw.split(|b| *b == b'\0').collect();
        if segments.last() == Some(&&b""[..]) {
            segments.pop();
        }

        let mut entries = segments.iter().map(|s| Self::parse_entry(s));
        let (owner, other) = entries.next()??;
        let acl = entries.collect::<Option<Vec<_>>>()?;

        Some(Acl { owner, other, acl })
    }

    /// One `<perm_char><domid>` segment.
    fn parse_entry(segment: &[u8]) -> Option<(u32, Perm)> {
        let (first, digits) = segment.split_first()?;
        let perm = Perm::from_char(*first as char)?;
        let domid = parse_domid(digits)?;
        Some((domid, perm))
    }

    /// Print the wire form. Every segment, including the last, is
    /// NUL-terminated, matching on-wire convention.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_entry(&mut out, self.owner, self.other);
        for &(domid, perm) in &self.acl {
            push_entry(&mut out, domid, perm);
        }
        out
    }
}

fn push_entry(out: &mut Vec<u8>, domid: u32, perm: Perm) {
    out.push(perm.to_char() as u8);
    out.extend_from_slice(domid.to_string().as_bytes());
    out.push(b'\0');
}

/// Decimal ASCII domain id. `str::parse` alone would admit `+5`.
fn parse_domid(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
