// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module reference resolution
//!
//! References are resolved against the requiring module's path the way a
//! relative URI reference is resolved against a base URI (RFC 3986, section
//! 5.2). Percent-encoded octets are left as written.

/// The five components of a URI reference (RFC 3986, appendix B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Components<'a> {
    scheme: Option<&'a str>,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> Components<'a> {
    fn parse(input: &'a str) -> Self {
        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (input, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        // A scheme is only a scheme if the colon comes before any slash
        let (scheme, rest) = match rest.find(':') {
            Some(pos) if pos > 0 && !rest[..pos].contains('/') && is_scheme(&rest[..pos]) => {
                (Some(&rest[..pos]), &rest[pos + 1..])
            }
            _ => (None, rest),
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };

        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve `reference` against `base` into a canonical module path.
///
/// An empty `base` means the reference was issued from the top level.
///
/// ```
/// use reqload_core::resolve;
///
/// assert_eq!(resolve("../data/core", "app/app"), "data/core");
/// assert_eq!(resolve("./core", "data/"), "data/core");
/// assert_eq!(resolve("math", ""), "math");
/// ```
pub fn resolve(reference: &str, base: &str) -> String {
    let r = Components::parse(reference);
    let b = Components::parse(base);

    let mut target = Components::default();
    let path;

    if r.scheme.is_some() {
        target.scheme = r.scheme;
        target.authority = r.authority;
        path = remove_dot_segments(r.path);
        target.query = r.query;
    } else {
        target.scheme = b.scheme;
        if r.authority.is_some() {
            target.authority = r.authority;
            path = remove_dot_segments(r.path);
            target.query = r.query;
        } else {
            target.authority = b.authority;
            if r.path.is_empty() {
                path = b.path.to_string();
                target.query = r.query.or(b.query);
            } else {
                if r.path.starts_with('/') {
                    path = remove_dot_segments(r.path);
                } else {
                    path = remove_dot_segments(&merge(&b, r.path));
                }
                target.query = r.query;
            }
        }
    }
    target.fragment = r.fragment;

    recompose(&target, &path)
}

/// Returns true if the reference is explicitly relative (`./x`, `../x`, `.`, `..`)
pub fn is_relative(reference: &str) -> bool {
    matches!(reference, "." | "..") || reference.starts_with("./") || reference.starts_with("../")
}

/// Merge a relative path onto the base path (RFC 3986, section 5.2.3)
fn merge(base: &Components<'_>, reference_path: &str) -> String {
    if base.authority.is_some() && base.path.is_empty() {
        return format!("/{}", reference_path);
    }
    match base.path.rfind('/') {
        Some(pos) => format!("{}{}", &base.path[..=pos], reference_path),
        None => reference_path.to_string(),
    }
}

/// Remove `.` and `..` segments from a path (RFC 3986, section 5.2.4).
///
/// `..` above the first segment is dropped rather than kept.
fn remove_dot_segments(path: &str) -> String {
    let mut input = path;
    let mut output: Vec<&str> = Vec::new();

    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") {
            input = &input[3..];
            output.pop();
        } else if input == "/.." {
            input = "/";
            output.pop();
        } else if input == "." || input == ".." {
            input = "";
        } else {
            // Move the first segment, including its leading slash, to the output
            let start = usize::from(input.starts_with('/'));
            let end = input[start..]
                .find('/')
                .map(|pos| pos + start)
                .unwrap_or(input.len());
            output.push(&input[..end]);
            input = &input[end..];
        }
    }

    let out = output.concat();
    // Relative module paths stay relative once their dot segments are gone
    match out.strip_prefix('/') {
        Some(stripped) if !path.starts_with('/') => stripped.to_string(),
        _ => out,
    }
}

/// Reassemble components into a reference string (RFC 3986, section 5.3)
fn recompose(components: &Components<'_>, path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 16);
    if let Some(scheme) = components.scheme {
        out.push_str(scheme);
        out.push(':');
    }
    if let Some(authority) = components.authority {
        out.push_str("//");
        out.push_str(authority);
    }
    out.push_str(path);
    if let Some(query) = components.query {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = components.fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
