//! Gitignore-style glob matcher (component A).
//!
//! Ported from the backtracking algorithm in Robert van Engelen's
//! `gitignore_glob_match` (itself derived from `match.cpp`, CPOL-licensed):
//! a single left-to-right scan that keeps two independent backtrack
//! positions, one for a bare `*` and one for `**`, so neither loop clobbers
//! the other's resume point. Runs in O(|text| * |pattern|) worst case.
//!
//! Semantics (case-sensitive, `dotglob = true`):
//! - `/` is the path separator and is never matched by `*`, `?`, or a
//!   character class.
//! - `*` matches a run of zero or more non-`/` characters.
//! - `**` (only meaningful before a `/` or at the pattern's end) matches
//!   zero or more path components, including crossing `/`.
//! - `?` matches exactly one non-`/` character.
//! - `[...]` matches one non-`/` character; a leading `!` or `^` inverts the
//!   class; `a-z` denotes an inclusive ASCII range.
//! - `\X` matches the literal character `X`.
//! - A pattern with no `/` matches against the basename of `text` only; a
//!   pattern starting with `/` is anchored to the whole path.
//! - A trailing `*` in the pattern is dropped before the end-of-text check,
//!   so it also matches the empty suffix.

const PATHSEP: u8 = b'/';

/// Returns true if `text` matches the gitignore-style `pattern`.
pub fn glob_match(text: &str, pattern: &str) -> bool {
    gitignore_glob_match(text.as_bytes(), pattern.as_bytes())
}

fn gitignore_glob_match(text: &[u8], glob: &[u8]) -> bool {
    let n = text.len();
    let m = glob.len();

    let mut i: usize = 0;
    let mut j: usize = 0;

    // Resume points for the independent `*` and `**` backtrack loops.
    let mut text1_backup: Option<usize> = None;
    let mut glob1_backup: Option<usize> = None;
    let mut text2_backup: Option<usize> = None;
    let mut glob2_backup: Option<usize> = None;

    // dotglob = true, so `nodot` (suppress matching a leading '.') is always false.
    let nodot = false;

    // Match pathname if glob contains a `/`, otherwise match the basename.
    if j + 1 < m && glob[j] == PATHSEP {
        while i + 1 < n && text[i] == b'.' && text[i + 1] == PATHSEP {
            i += 2;
        }
        if i < n && text[i] == PATHSEP {
            i += 1;
        }
        j += 1;
    } else if !glob.contains(&PATHSEP) {
        if let Some(sep) = text.iter().rposition(|&b| b == PATHSEP) {
            i = sep + 1;
        }
    }

    'outer: while i < n {
        let text_i = text[i];
        if j < m {
            match glob[j] {
                b'*' => {
                    if nodot && text_i == b'.' {
                        // fall through to backtrack
                    } else {
                        j += 1;
                        if j < m && glob[j] == b'*' {
                            // `**`
                            j += 1;
                            if j >= m {
                                return true;
                            }
                            if glob[j] != PATHSEP {
                                return false;
                            }
                            // New **-loop discards any pending *-loop.
                            text1_backup = None;
                            glob1_backup = None;
                            text2_backup = Some(i);
                            glob2_backup = Some(j);
                            if text_i != PATHSEP {
                                j += 1;
                            }
                            continue 'outer;
                        }
                        // Trailing `*` matches everything except `/`.
                        text1_backup = Some(i);
                        glob1_backup = Some(j);
                        continue 'outer;
                    }
                }
                b'?' => {
                    if !(nodot && text_i == b'.') && text_i != PATHSEP {
                        i += 1;
                        j += 1;
                        continue 'outer;
                    }
                }
                b'[' => {
                    if !(nodot && text_i == b'.') && text_i != PATHSEP {
                        let mut matched = false;
                        let reverse = j + 1 < m && (glob[j + 1] == b'^' || glob[j + 1] == b'!');
                        if reverse {
                            j += 1;
                        }
                        let mut lastchr: Option<u8> = None;
                        j += 1;
                        while j < m && glob[j] != b']' {
                            let is_range = lastchr.is_some()
                                && glob[j] == b'-'
                                && j + 1 < m
                                && glob[j + 1] != b']';
                            if is_range {
                                j += 1;
                                if text_i <= glob[j] && text_i >= lastchr.unwrap() {
                                    matched = true;
                                }
                            } else if text_i == glob[j] {
                                matched = true;
                            }
                            lastchr = Some(glob[j]);
                            j += 1;
                        }
                        if matched != reverse {
                            i += 1;
                            if j < m {
                                j += 1;
                            }
                            continue 'outer;
                        }
                    }
                }
                b'\\' => {
                    if j + 1 < m {
                        j += 1;
                    }
                    let glob_j = glob[j];
                    if glob_j == text_i || (glob_j == PATHSEP && text_i == PATHSEP) {
                        i += 1;
                        j += 1;
                        continue 'outer;
                    }
                }
                glob_j => {
                    if glob_j == text_i || (glob_j == PATHSEP && text_i == PATHSEP) {
                        i += 1;
                        j += 1;
                        continue 'outer;
                    }
                }
            }
        }

        // No match at (i, j): backtrack.
        if let (Some(mut t1), Some(g1)) = (text1_backup, glob1_backup) {
            if text[t1] != PATHSEP {
                t1 += 1;
                text1_backup = Some(t1);
                i = t1;
                j = g1;
                continue 'outer;
            }
        }
        if let (Some(mut t2), Some(g2)) = (text2_backup, glob2_backup) {
            t2 += 1;
            text2_backup = Some(t2);
            i = t2;
            j = g2;
            continue 'outer;
        }
        return false;
    }

    // Ignore trailing stars.
    while j < m && glob[j] == b'*' {
        j += 1;
    }
    j >= m
}

/// `true` iff `object` contains an unescaped occurrence of any of `* ? [ ! ^`.
///
/// `!`/`^` only count as multifile markers inside an otherwise-open `[`
/// class in the glob grammar, but per the spec's classification rule any
/// unescaped occurrence of these characters anywhere in the string marks
/// the pattern multifile — callers that embed a literal `!`/`^`/`[`/`?`/`*`
/// must escape it with `\`.
pub fn is_multifile(object: &str) -> bool {
    first_special_index(object).is_some()
}

/// The byte index of the first unescaped glob metacharacter in `object`, if any.
pub fn first_special_index(object: &str) -> Option<usize> {
    let bytes = object.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'*' | b'?' | b'[' | b'!' | b'^' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// The literal list-prefix of a (possibly multifile) object pattern: the
/// bytes before the first unescaped metacharacter.
pub fn literal_prefix(object: &str) -> &str {
    match first_special_index(object) {
        Some(p) => &object[..p],
        None => object,
    }
}
