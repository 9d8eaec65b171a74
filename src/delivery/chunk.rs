//! Byte-limited splitting of outbound messages.
//!
//! All limits are UTF-8 byte counts; a cut never falls inside a character.

/// Split `content` into ordered parts of at most `limit` bytes.
///
/// When the last newline inside a candidate cut lies past its midpoint, the
/// cut is moved to just after that newline. Concatenating the parts yields
/// `content`. A `limit` smaller than a single character still makes progress
/// by emitting that character alone.
#[must_use]
pub fn split_text(content: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = content;

    while !rest.is_empty() {
        if rest.len() <= limit {
            parts.push(rest.to_owned());
            break;
        }

        let mut cut = floor_char_boundary(rest, limit);
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        if let Some(newline) = rest[..cut].rfind('\n') {
            if newline > cut / 2 {
                cut = newline + 1;
            }
        }

        let (head, tail) = rest.split_at(cut);
        parts.push(head.to_owned());
        rest = tail;
    }

    parts
}

/// Prefix every part but the first with `"[i/total]\n"` when there is more
/// than one part.
#[must_use]
pub fn label_parts(parts: Vec<String>) -> Vec<String> {
    let total = parts.len();
    if total <= 1 {
        return parts;
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(index, part)| {
            if index == 0 {
                part
            } else {
                format!("[{}/{total}]\n{part}", index + 1)
            }
        })
        .collect()
}

/// Split and label `content` so that every labelled part fits in `limit`.
///
/// Room for the `[i/total]` marker is reserved by re-splitting with a
/// reduced limit until the marker width is stable.
#[must_use]
pub fn split_labelled(content: &str, limit: usize) -> Vec<String> {
    let mut parts = split_text(content, limit);
    if parts.len() <= 1 {
        return parts;
    }

    let mut reserve = marker_len(parts.len());
    loop {
        parts = split_text(content, limit.saturating_sub(reserve).max(1));
        let needed = marker_len(parts.len());
        if needed <= reserve {
            break;
        }
        reserve = needed;
    }
    label_parts(parts)
}

/// Split markdown on line boundaries into parts of at most `limit` bytes.
///
/// Lines are accumulated whole (each keeps its trailing newline) and no
/// markers are added. A single line longer than `limit` is hard-split with
/// [`split_text`].
#[must_use]
pub fn split_markdown(content: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for raw in content.split('\n') {
        let line = format!("{raw}\n");

        if current.len() + line.len() <= limit {
            current.push_str(&line);
            continue;
        }

        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }

        if line.len() <= limit {
            current = line;
        } else {
            let mut pieces = split_text(&line, limit);
            if let Some(last) = pieces.pop() {
                parts.extend(pieces);
                current = last;
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn marker_len(total: usize) -> usize {
    format!("[{total}/{total}]\n").len()
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut cut = index;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}
