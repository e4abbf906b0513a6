//! Template name normalization and validation
//!
//! Template names are root-based, `/`-separated paths, optionally prefixed
//! with a scheme (`classpath:com/example/t.t`, `cms://example.com/t.t`).
//! This module canonicalizes requested names into that form:
//!
//! - `\` is rejected outright; use `/`.
//! - `:` may only appear as the scheme separator, never in the path part.
//! - NUL characters are rejected for security reasons.
//! - `//` collapses to `/`; a normalized name never starts with `/`.
//! - `.` steps are removed; `..` steps delete the previous path segment. A
//!   `..` that would climb above the root is a [`MalformedNameError`], even
//!   when the crossed segment is a `*` acquisition step.
//! - A `..` that deletes through a `*` step absorbs it, leaving a single
//!   `*/` behind, so the acquisition point survives the resolution.
//! - Consecutive `*` steps collapse into one, and a leading `*` step is
//!   dropped as redundant (climbing from the root finds the same names).
//!
//! A trailing `/` is significant: operations that manipulate names treat
//! the last step as a directory exactly when it is present. The empty name
//! refers to the root directory.
//!
//! Normalization is idempotent: `normalize(normalize(x)) == normalize(x)`
//! for every accepted `x`.

use crate::core::MalformedNameError;

/// Canonicalizes a root-based template name.
///
/// See the module docs for the rules applied. The scheme part, when
/// present, is preserved byte for byte (`scheme:/x` normalizes to
/// `scheme:x` because the path part is made root-relative, while
/// `scheme://x` keeps its separator).
///
/// # Errors
///
/// Returns [`MalformedNameError`] for backslashes, NUL characters, `:` in
/// the path part, and `..` steps crossing above the root.
pub fn normalize_root_based_name(name: &str) -> Result<String, MalformedNameError> {
    if name.contains('\0') {
        return Err(MalformedNameError::new(
            name,
            "the NUL character (\\0) is not allowed in template names",
        ));
    }
    if name.contains('\\') {
        return Err(MalformedNameError::new(
            name,
            "backslash (\"\\\") is not allowed in template names; use slash (\"/\") instead",
        ));
    }

    let scheme_end = find_scheme_section_end(name);
    let (scheme, path) = name.split_at(scheme_end);

    if path.contains(':') {
        return Err(MalformedNameError::new(
            name,
            "the ':' character can only be used after the scheme name (if there's any), \
             not in the path part",
        ));
    }

    let path = remove_redundant_slashes(path);
    // The path no longer starts with "/".
    let path = remove_dot_steps(&path);
    let path = resolve_dot_dot_steps(&path, name)?;
    let path = remove_redundant_star_steps(&path);

    Ok(if scheme.is_empty() { path } else { format!("{scheme}{path}") })
}

/// Resolves `target_name` against `base_name`, scheme-aware.
///
/// A target with its own scheme is returned as-is. A target starting with
/// `/` is root-based within `base_name`'s scheme. Otherwise the target is
/// relative to the directory containing `base_name`. The result is not
/// normalized; pass it through [`normalize_root_based_name`] before use.
pub fn to_root_based_name(base_name: &str, target_name: &str) -> String {
    if find_scheme_section_end(target_name) != 0 {
        return target_name.to_string();
    }
    if let Some(target_as_relative) = target_name.strip_prefix('/') {
        let scheme_end = find_scheme_section_end(base_name);
        if scheme_end == 0 {
            target_as_relative.to_string()
        } else {
            // Keep the scheme of the base name.
            format!("{}{}", &base_name[..scheme_end], target_as_relative)
        }
    } else {
        let base_dir = if base_name.ends_with('/') {
            base_name
        } else {
            // Not a directory name; take the containing directory.
            let base_end = match base_name.rfind('/') {
                Some(idx) => idx + 1,
                // For names like "classpath:t.t" the scheme part must stay.
                None => find_scheme_section_end(base_name),
            };
            &base_name[..base_end]
        };
        format!("{base_dir}{target_name}")
    }
}

/// Converts a root-based name to its absolute display form, which starts
/// with `/` unless the name has a scheme part.
pub fn root_based_to_absolute_name(name: &str) -> String {
    if find_scheme_section_end(name) != 0 || name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

/// Byte offset of the end of the scheme section (including the `:` or
/// `://` separator), or 0 when the name has no scheme. A `:` only counts
/// as a scheme separator when no `/` precedes it.
fn find_scheme_section_end(name: &str) -> usize {
    let bytes = name.as_bytes();
    match name.find(':') {
        Some(colon_idx) if !bytes[..colon_idx].contains(&b'/') => {
            // A following "//" belongs to the scheme section.
            if bytes.get(colon_idx + 1) == Some(&b'/') && bytes.get(colon_idx + 2) == Some(&b'/') {
                colon_idx + 3
            } else {
                colon_idx + 1
            }
        }
        _ => 0,
    }
}

fn remove_redundant_slashes(path: &str) -> String {
    let mut path = path.to_string();
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    match path.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Removes `.` steps. `foo/./bar` becomes `foo/bar`; a trailing `foo/.`
/// becomes `foo/` (still a directory name).
fn remove_dot_steps(path: &str) -> String {
    let mut path = path.to_string();
    let mut next_from = path.len();
    loop {
        let Some(dot_idx) = path[..next_from].rfind('.') else {
            return path;
        };
        next_from = dot_idx;

        if dot_idx != 0 && path.as_bytes()[dot_idx - 1] != b'/' {
            // Part of a longer step name, not a "." step.
            continue;
        }
        let slash_right = match path.as_bytes().get(dot_idx + 1) {
            None => false,
            Some(b'/') => true,
            Some(_) => continue,
        };

        if slash_right {
            // "foo/./bar" or "./bar"
            path = format!("{}{}", &path[..dot_idx], &path[dot_idx + 2..]);
        } else {
            // "foo/." or "."
            path.truncate(path.len() - 1);
        }
        next_from = next_from.min(path.len());
    }
}

/// Resolves `..` steps by deleting the previous segment, absorbing (and
/// re-emitting once) any `*` steps crossed on the way.
fn resolve_dot_dot_steps(path: &str, name: &str) -> Result<String, MalformedNameError> {
    let mut path = path.to_string();
    let mut next_from = 0usize;
    loop {
        let Some(rel_idx) = path[next_from..].find("..") else {
            return Ok(path);
        };
        let dot_dot_idx = next_from + rel_idx;

        if dot_dot_idx == 0 {
            return Err(new_root_leaving_error(name));
        }
        let bytes = path.as_bytes();
        if bytes[dot_dot_idx - 1] != b'/' {
            // Part of a longer step name.
            next_from = (dot_dot_idx + 3).min(path.len());
            continue;
        }
        let slash_right = match bytes.get(dot_dot_idx + 2) {
            None => false,
            Some(b'/') => true,
            Some(_) => {
                next_from = (dot_dot_idx + 3).min(path.len());
                continue;
            }
        };
        // Here we know "/.." makes up a whole step.

        let (previous_slash_idx, skipped_star_step) =
            scan_backwards_over_star_steps(&path, name, dot_dot_idx)?;

        // Removed part in {}: "a/{b/*/../}c" or "a/{b/*/..}"
        let keep_to = previous_slash_idx.map_or(0, |idx| idx + 1);
        let tail_from = dot_dot_idx + if slash_right { 3 } else { 2 };
        path = format!(
            "{}{}{}",
            &path[..keep_to],
            if skipped_star_step { "*/" } else { "" },
            &path[tail_from..]
        );
        next_from = keep_to;
    }
}

/// Finds the `/` that begins the segment a `..` step deletes, skipping
/// (and reporting) any `*` acquisition steps on the way. `None` means the
/// deleted segment is the first one in the path.
fn scan_backwards_over_star_steps(
    path: &str,
    name: &str,
    dot_dot_idx: usize,
) -> Result<(Option<usize>, bool), MalformedNameError> {
    let bytes = path.as_bytes();
    let mut skipped_star_step = false;
    // Start before the "/..".
    let mut search_backwards_from = dot_dot_idx as isize - 2;
    loop {
        if search_backwards_from < 0 {
            return Err(new_root_leaving_error(name));
        }
        match path[..=search_backwards_from as usize].rfind('/') {
            None => {
                if search_backwards_from == 0 && bytes[0] == b'*' {
                    // "*/.."
                    return Err(new_root_leaving_error(name));
                }
                return Ok((None, skipped_star_step));
            }
            Some(slash_idx)
                if bytes.get(slash_idx + 1) == Some(&b'*')
                    && bytes.get(slash_idx + 2) == Some(&b'/') =>
            {
                skipped_star_step = true;
                search_backwards_from = slash_idx as isize - 1;
            }
            Some(slash_idx) => return Ok((Some(slash_idx), skipped_star_step)),
        }
    }
}

/// Collapses `*/*` sequences and drops a redundant leading `*` step.
fn remove_redundant_star_steps(path: &str) -> String {
    let mut path = path.to_string();
    loop {
        let Some(suspicious_idx) = path.find("*/*") else {
            break;
        };
        // Only when delimited on both sides by "/" or the string boundary.
        let bytes = path.as_bytes();
        if (suspicious_idx == 0 || bytes[suspicious_idx - 1] == b'/')
            && (suspicious_idx + 3 == path.len() || bytes[suspicious_idx + 3] == b'/')
        {
            path = format!("{}{}", &path[..suspicious_idx], &path[suspicious_idx + 2..]);
        } else {
            break;
        }
    }

    // An initial "*" step is redundant.
    if path == "*" {
        String::new()
    } else if let Some(rest) = path.strip_prefix("*/") {
        rest.to_string()
    } else {
        path
    }
}

fn new_root_leaving_error(name: &str) -> MalformedNameError {
    MalformedNameError::new(
        name,
        "the \"..\" path step would climb above the template root directory",
    )
}
