//! Tree serialization.
//!
//! Resolution produces a flat, well-ordered tag list; this module turns that
//! list plus the original text into an output tree. The default form is XML:
//!
//! - `<pt>` wraps the whole text when no tag survived (plain text);
//! - `<rt>` wraps the rich-text form;
//! - `<i>` wraps whitespace absorbed by trim directives;
//! - `<st>` / `<et>` wrap the textual form of a start/end tag;
//! - element names mirror tag names, attributes are emitted in name order.
//!
//! Every input byte lands in exactly one text segment, so concatenating the
//! character data of the output recovers the input — [`extract_text`] does
//! that, and the engine's tests hold it as an invariant.
//!
//! [`Emitter`] is the swap point: a downstream consumer can emit any other
//! format from the same tag list without touching resolution.

use crate::TagEvent;

/// A pluggable tree emitter.
pub trait Emitter {
    fn emit(&self, text: &str, tags: &[TagEvent]) -> String;
}

/// The default XML emitter.
///
/// Elements left open when the document ends are closed at the end, matching
/// an XML writer's auto-close on document end.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlEmitter;

impl Emitter for XmlEmitter {
    fn emit(&self, text: &str, tags: &[TagEvent]) -> String {
        if tags.is_empty() {
            let mut out = String::with_capacity(text.len() + 9);
            out.push_str("<pt>");
            push_text(&mut out, text);
            out.push_str("</pt>");
            return out;
        }

        let mut out = String::with_capacity(text.len() * 2);
        out.push_str("<rt>");
        let mut open: Vec<&str> = Vec::new();
        let mut cursor = 0usize;

        for tag in tags {
            push_text(&mut out, text.get(cursor..tag.pos).unwrap_or(""));
            cursor = tag.end_pos();

            let slice = text.get(tag.pos..tag.end_pos()).unwrap_or("");
            let lead = tag.trim_before.min(slice.len());
            let (ws_before, rest) = slice.split_at(lead);
            let cut = rest.len().saturating_sub(tag.trim_after);
            let (body, ws_after) = rest.split_at(cut);

            push_ws(&mut out, ws_before);

            if tag.is_start_tag() {
                out.push('<');
                out.push_str(&tag.name);
                for (name, value) in &tag.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                if tag.is_end_tag() {
                    // Self-closing: the textual form is element content.
                    if body.is_empty() {
                        out.push_str("/>");
                    } else {
                        out.push('>');
                        push_text(&mut out, body);
                        out.push_str("</");
                        out.push_str(&tag.name);
                        out.push('>');
                    }
                    push_ws(&mut out, ws_after);
                } else {
                    out.push('>');
                    if !body.is_empty() {
                        out.push_str("<st>");
                        push_text(&mut out, body);
                        out.push_str("</st>");
                    }
                    push_ws(&mut out, ws_after);
                    open.push(&tag.name);
                }
            } else {
                if !body.is_empty() {
                    out.push_str("<et>");
                    push_text(&mut out, body);
                    out.push_str("</et>");
                }
                open.pop();
                out.push_str("</");
                out.push_str(&tag.name);
                out.push('>');
                push_ws(&mut out, ws_after);
            }
        }

        push_text(&mut out, text.get(cursor..).unwrap_or(""));

        // EOF with opens left on the stack: close them all.
        while let Some(name) = open.pop() {
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }

        out.push_str("</rt>");
        out
    }
}

fn push_text(out: &mut String, text: &str) {
    if !text.is_empty() {
        out.push_str(&html_escape::encode_text(text));
    }
}

fn push_ws(out: &mut String, ws: &str) {
    if !ws.is_empty() {
        out.push_str("<i>");
        out.push_str(&html_escape::encode_text(ws));
        out.push_str("</i>");
    }
}

/// Recover the original input from an emitted XML tree.
///
/// Walks the markup with a small scanner (skipping tags, honoring quoted
/// attribute values) and decodes the character data. For any tree produced by
/// [`XmlEmitter`] this is the exact inverse of serialization.
pub fn extract_text(xml: &str) -> String {
    let mut data = String::with_capacity(xml.len());
    let mut chars = xml.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            data.push(c);
            continue;
        }
        // Inside a tag: skip to the closing '>', stepping over quoted values.
        while let Some(t) = chars.next() {
            match t {
                '>' => break,
                '"' | '\'' => {
                    let quote = t;
                    for q in chars.by_ref() {
                        if q == quote {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    html_escape::decode_html_entities(&data).into_owned()
}
