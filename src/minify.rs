//! Content minification strategies.
//!
//! The embedding pipeline shrinks text-like assets before compressing them.
//! Dispatch is data-driven: [`strategy_for`] maps a normalized file
//! extension to a minifier function, and unknown extensions get no entry
//! (the pipeline passes them through untouched). A minifier that fails is a
//! hard error — the pipeline never falls back to embedding the unminified
//! bytes, because a failure usually means the input is malformed and the
//! build should say so.
//!
//! ## Strategy Table
//!
//! | Extension | Minifier |
//! |-----------|----------|
//! | `html` | [`minify_html`] — whitespace/comment stripping, raw-text elements preserved |
//! | `svg` | [`minify_svg`] — markup minifier without HTML raw-text rules |
//! | `xml` | [`minify_xml`] — same as SVG |
//! | `css` | [`minify_css`] — comment stripping, token-aware whitespace collapse |
//! | `js` | [`minify_js`] — comment stripping, line-level whitespace collapse |
//! | `json` | [`minify_json`] — parse and re-encode compactly via serde_json |
//!
//! ## Conservatism
//!
//! These minifiers only remove bytes that provably cannot change meaning:
//! comments, indentation, and formatting whitespace. They do not rename,
//! reorder, or restructure anything. Whitespace-only text in markup is
//! dropped only when the run contains a newline (formatting); a single
//! inline space between elements is kept because it can be significant.
//! JavaScript newlines are kept wherever a statement could end, so
//! automatic semicolon insertion is never disturbed.

use std::str;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinifyError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} input is not valid UTF-8")]
    NotUtf8(&'static str),
    #[error("unterminated {0}")]
    Unterminated(&'static str),
}

/// Minifier signature: whole input in, whole output out.
pub type MinifyFn = fn(&[u8]) -> Result<Vec<u8>, MinifyError>;

const STRATEGIES: &[(&str, MinifyFn)] = &[
    ("html", minify_html),
    ("svg", minify_svg),
    ("xml", minify_xml),
    ("css", minify_css),
    ("js", minify_js),
    ("json", minify_json),
];

/// Look up the minifier for a file extension (case-insensitive).
///
/// Returns `None` for unrecognized extensions; the caller passes those
/// through unmodified.
pub fn strategy_for(extension: &str) -> Option<MinifyFn> {
    STRATEGIES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|&(_, f)| f)
}

fn text<'a>(input: &'a [u8], kind: &'static str) -> Result<&'a str, MinifyError> {
    str::from_utf8(input).map_err(|_| MinifyError::NotUtf8(kind))
}

// =============================================================================
// Markup (HTML / SVG / XML)
// =============================================================================

/// HTML elements whose text content is copied verbatim.
const HTML_RAW_ELEMENTS: &[&str] = &["pre", "script", "style", "textarea"];

pub fn minify_html(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    let src = text(input, "html")?;
    Ok(minify_markup(src, HTML_RAW_ELEMENTS)?.into_bytes())
}

pub fn minify_svg(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    let src = text(input, "svg")?;
    Ok(minify_markup(src, &[])?.into_bytes())
}

pub fn minify_xml(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    let src = text(input, "xml")?;
    Ok(minify_markup(src, &[])?.into_bytes())
}

fn minify_markup(src: &str, raw_elements: &[&str]) -> Result<String, MinifyError> {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;

    loop {
        let Some(lt) = rest.find('<') else {
            push_text(&mut out, rest);
            break;
        };
        push_text(&mut out, &rest[..lt]);
        rest = &rest[lt..];

        if let Some(stripped) = rest.strip_prefix("<!--") {
            let end = stripped
                .find("-->")
                .ok_or(MinifyError::Unterminated("markup comment"))?;
            rest = &stripped[end + 3..];
            continue;
        }

        if let Some(stripped) = rest.strip_prefix("<![CDATA[") {
            let end = stripped
                .find("]]>")
                .ok_or(MinifyError::Unterminated("CDATA section"))?;
            out.push_str("<![CDATA[");
            out.push_str(&stripped[..end + 3]);
            rest = &stripped[end + 3..];
            continue;
        }

        let (name, closing, self_closing, after) = copy_tag(&mut out, rest)?;
        rest = after;

        if !closing && !self_closing && raw_elements.contains(&name.as_str()) {
            // Copy raw content verbatim up to the matching close tag.
            let lower = rest.to_ascii_lowercase();
            let needle = format!("</{name}");
            let end = lower
                .find(&needle)
                .ok_or(MinifyError::Unterminated("raw-text element"))?;
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        }
    }

    // Trailing formatting space from the final text node.
    if out.ends_with(' ') {
        out.pop();
    }
    Ok(out)
}

/// Collapse a text node: each whitespace run becomes a single space, or
/// nothing if the run contains a newline (pure formatting). Leading runs
/// at document start are dropped.
fn push_text(out: &mut String, text: &str) {
    let mut run_newline = false;
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_run = true;
            run_newline |= c == '\n' || c == '\r';
        } else {
            if in_run && !run_newline && !out.is_empty() {
                out.push(' ');
            }
            in_run = false;
            run_newline = false;
            out.push(c);
        }
    }
    if in_run && !run_newline && !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
}

/// Copy one tag (from `<` through `>`), collapsing attribute whitespace.
///
/// Returns (lowercased tag name, is_closing, is_self_closing, rest).
fn copy_tag<'a>(
    out: &mut String,
    s: &'a str,
) -> Result<(String, bool, bool, &'a str), MinifyError> {
    debug_assert!(s.starts_with('<'));
    let body = &s[1..];
    let closing = body.starts_with('/');
    let name: String = body
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase();

    out.push('<');
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    let mut last = '<';
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            last = c;
            continue;
        }
        match c {
            '"' | '\'' => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                quote = Some(c);
                out.push(c);
                last = c;
            }
            '>' => {
                out.push('>');
                return Ok((name, closing, last == '/', &body[i + 1..]));
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
                last = c;
            }
        }
    }
    Err(MinifyError::Unterminated("tag"))
}

// =============================================================================
// CSS
// =============================================================================

pub fn minify_css(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    let src = text(input, "css")?;
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return Err(MinifyError::Unterminated("CSS comment"));
                }
                // A comment separates tokens the same way whitespace does.
                pending_space = true;
            }
            '"' | '\'' => {
                flush_css_space(&mut out, &mut pending_space, c);
                out.push(c);
                let mut escaped = false;
                let mut closed = false;
                for sc in chars.by_ref() {
                    out.push(sc);
                    if escaped {
                        escaped = false;
                    } else if sc == '\\' {
                        escaped = true;
                    } else if sc == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(MinifyError::Unterminated("CSS string"));
                }
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                flush_css_space(&mut out, &mut pending_space, c);
                out.push(c);
            }
        }
    }
    Ok(out.into_bytes())
}

/// Emit a collapsed space unless it sits next to punctuation that makes it
/// redundant. Spaces before `:` are kept (`a :hover` is not `a:hover`);
/// spaces after `:` are dropped (`color: red` → `color:red`).
fn flush_css_space(out: &mut String, pending: &mut bool, next: char) {
    if !*pending {
        return;
    }
    *pending = false;
    let prev = out.chars().next_back();
    let drop = match prev {
        None => true,
        Some(p) => "{};,:".contains(p) || "{};,".contains(next),
    };
    if !drop {
        out.push(' ');
    }
}

// =============================================================================
// JavaScript
// =============================================================================

/// Keywords after which a `/` starts a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// One nesting level inside a template literal.
enum JsLevel {
    /// Template text between backticks.
    Template,
    /// Code inside `${ ... }`, tracking unbalanced open braces.
    Interp(u32),
}

pub fn minify_js(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    let src = text(input, "js")?;
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();

    // 0 = no pending whitespace, 1 = space, 2 = newline. Newlines win so
    // automatic semicolon insertion is preserved.
    let mut pending: u8 = 0;
    // Last significant character emitted in code position.
    let mut prev: Option<char> = None;
    // Trailing identifier characters of `out`, for keyword detection.
    let mut word = String::new();
    let mut levels: Vec<JsLevel> = Vec::new();

    while let Some(c) = chars.next() {
        // Template text copies verbatim; only `\`, `` ` `` and `${` matter.
        if matches!(levels.last(), Some(JsLevel::Template)) {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(esc) = chars.next() {
                        out.push(esc);
                    }
                }
                '`' => {
                    levels.pop();
                    prev = Some(')');
                    word.clear();
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                    levels.push(JsLevel::Interp(0));
                    prev = None;
                }
                _ => {}
            }
            continue;
        }

        match c {
            '/' if chars.peek() == Some(&'/') => {
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        pending = 2;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut star = false;
                let mut newline = false;
                let mut closed = false;
                for nc in chars.by_ref() {
                    if star && nc == '/' {
                        closed = true;
                        break;
                    }
                    star = nc == '*';
                    newline |= nc == '\n';
                }
                if !closed {
                    return Err(MinifyError::Unterminated("block comment"));
                }
                // A comment spanning lines counts as a line terminator.
                pending = if newline { 2 } else { pending.max(1) };
            }
            '/' if regex_position(prev, &word) => {
                flush_js_space(&mut out, &mut pending, '/');
                out.push('/');
                let mut in_class = false;
                let mut escaped = false;
                let mut closed = false;
                for rc in chars.by_ref() {
                    if rc == '\n' {
                        break;
                    }
                    out.push(rc);
                    if escaped {
                        escaped = false;
                    } else {
                        match rc {
                            '\\' => escaped = true,
                            '[' => in_class = true,
                            ']' => in_class = false,
                            '/' if !in_class => {
                                closed = true;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
                if !closed {
                    return Err(MinifyError::Unterminated("regular expression"));
                }
                // Copy any flags.
                while let Some(&fc) = chars.peek() {
                    if !fc.is_ascii_alphabetic() {
                        break;
                    }
                    chars.next();
                    out.push(fc);
                }
                prev = Some(')');
                word.clear();
            }
            '"' | '\'' => {
                flush_js_space(&mut out, &mut pending, c);
                out.push(c);
                let mut escaped = false;
                let mut closed = false;
                for sc in chars.by_ref() {
                    if sc == '\n' && !escaped {
                        break;
                    }
                    out.push(sc);
                    if escaped {
                        escaped = false;
                    } else if sc == '\\' {
                        escaped = true;
                    } else if sc == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(MinifyError::Unterminated("string"));
                }
                prev = Some(')');
                word.clear();
            }
            '`' => {
                flush_js_space(&mut out, &mut pending, '`');
                out.push('`');
                levels.push(JsLevel::Template);
            }
            c if c.is_whitespace() => {
                pending = if c == '\n' || c == '\r' {
                    2
                } else {
                    pending.max(1)
                };
            }
            c => {
                if c == '{'
                    && let Some(JsLevel::Interp(n)) = levels.last_mut()
                {
                    *n += 1;
                }
                if c == '}'
                    && let Some(JsLevel::Interp(n)) = levels.last_mut()
                {
                    if *n == 0 {
                        // End of interpolation; back to template text.
                        levels.pop();
                        out.push('}');
                        pending = 0;
                        continue;
                    }
                    *n -= 1;
                }
                let after_gap = pending != 0;
                flush_js_space(&mut out, &mut pending, c);
                out.push(c);
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    if after_gap {
                        word.clear();
                    }
                    word.push(c);
                } else {
                    word.clear();
                }
                prev = Some(c);
            }
        }
    }
    // Drop a trailing newline marker; nothing follows it.
    Ok(out.into_bytes())
}

fn regex_position(prev: Option<char>, word: &str) -> bool {
    match prev {
        None => true,
        Some(c) if "([{,;=:!&|?+-*%<>~^".contains(c) => true,
        Some(c) if c.is_alphanumeric() || c == '_' || c == '$' => {
            REGEX_KEYWORDS.contains(&word)
        }
        _ => false,
    }
}

/// Emit pending whitespace. Spaces are dropped when adjacent to
/// unambiguous punctuation. Newlines survive between ordinary tokens so
/// automatic semicolon insertion is never disturbed; they are dropped only
/// where no statement can end (after `{ ( ; , [` and before `) ] }`).
fn flush_js_space(out: &mut String, pending: &mut u8, next: char) {
    let p = std::mem::take(pending);
    if out.is_empty() {
        return;
    }
    let prev = out.chars().next_back();
    match p {
        2 => {
            let drop = matches!(prev, Some(c) if "{(;,[".contains(c)) || ")]}".contains(next);
            if !drop {
                out.push('\n');
            }
        }
        1 => {
            let drop = matches!(prev, Some(c) if "(){}[];,".contains(c))
                || "(){}[];,".contains(next);
            if !drop {
                out.push(' ');
            }
        }
        _ => {}
    }
}

// =============================================================================
// JSON
// =============================================================================

pub fn minify_json(input: &[u8]) -> Result<Vec<u8>, MinifyError> {
    let value: serde_json::Value = serde_json::from_slice(input)?;
    Ok(serde_json::to_vec(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mini(f: MinifyFn, input: &str) -> String {
        String::from_utf8(f(input.as_bytes()).unwrap()).unwrap()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[test]
    fn known_extensions_have_strategies() {
        for ext in ["html", "svg", "xml", "css", "js", "json"] {
            assert!(strategy_for(ext).is_some(), "no strategy for {ext}");
        }
    }

    #[test]
    fn dispatch_is_case_insensitive() {
        assert!(strategy_for("HTML").is_some());
        assert!(strategy_for("Js").is_some());
    }

    #[test]
    fn unknown_extensions_pass_through() {
        assert!(strategy_for("png").is_none());
        assert!(strategy_for("woff2").is_none());
        assert!(strategy_for("").is_none());
    }

    // =========================================================================
    // HTML / markup
    // =========================================================================

    #[test]
    fn html_simple_paragraph_unchanged() {
        assert_eq!(mini(minify_html, "<p>Hi</p>"), "<p>Hi</p>");
    }

    #[test]
    fn html_formatting_whitespace_dropped() {
        assert_eq!(
            mini(minify_html, "<div>\n    <p>\n        Hi\n    </p>\n</div>\n"),
            "<div><p>Hi</p></div>"
        );
    }

    #[test]
    fn html_inline_space_between_elements_kept() {
        assert_eq!(
            mini(minify_html, "<b>a</b> <i>b</i>"),
            "<b>a</b> <i>b</i>"
        );
    }

    #[test]
    fn html_text_runs_collapse_to_single_space() {
        assert_eq!(mini(minify_html, "<p>a   b\tc</p>"), "<p>a b c</p>");
    }

    #[test]
    fn html_comments_removed() {
        assert_eq!(
            mini(minify_html, "<p>a</p><!-- note -->\n<p>b</p>"),
            "<p>a</p><p>b</p>"
        );
    }

    #[test]
    fn html_attribute_whitespace_collapsed() {
        assert_eq!(
            mini(minify_html, "<a   href=\"x\"\n   class='y' >link</a>"),
            "<a href=\"x\" class='y'>link</a>"
        );
    }

    #[test]
    fn html_quoted_attribute_values_untouched() {
        assert_eq!(
            mini(minify_html, "<a title=\"two  spaces > here\">x</a>"),
            "<a title=\"two  spaces > here\">x</a>"
        );
    }

    #[test]
    fn html_pre_content_preserved() {
        let src = "<pre>\n  indented\n    more\n</pre>";
        assert_eq!(mini(minify_html, src), src);
    }

    #[test]
    fn html_script_content_preserved() {
        let src = "<script>if (a < b) { go() }</script>";
        assert_eq!(mini(minify_html, src), src);
    }

    #[test]
    fn html_unterminated_comment_is_error() {
        assert!(matches!(
            minify_html(b"<p>a</p><!-- oops"),
            Err(MinifyError::Unterminated(_))
        ));
    }

    #[test]
    fn html_invalid_utf8_is_error() {
        assert!(matches!(
            minify_html(&[b'<', 0xff, b'>']),
            Err(MinifyError::NotUtf8("html"))
        ));
    }

    #[test]
    fn svg_minifies_like_markup() {
        assert_eq!(
            mini(
                minify_svg,
                "<svg>\n  <!-- icon -->\n  <path d=\"M0 0\"/>\n</svg>"
            ),
            "<svg><path d=\"M0 0\"/></svg>"
        );
    }

    #[test]
    fn xml_cdata_preserved() {
        let src = "<doc><![CDATA[  raw > stuff  ]]></doc>";
        assert_eq!(mini(minify_xml, src), src);
    }

    // =========================================================================
    // CSS
    // =========================================================================

    #[test]
    fn css_comments_and_indentation_removed() {
        assert_eq!(
            mini(
                minify_css,
                "/* header */\nbody {\n    color: red;\n    margin: 0;\n}\n"
            ),
            "body{color:red;margin:0;}"
        );
    }

    #[test]
    fn css_descendant_combinator_kept() {
        assert_eq!(mini(minify_css, "nav a { color: blue }"), "nav a{color:blue}");
    }

    #[test]
    fn css_space_before_colon_kept() {
        // `a :hover` selects differently from `a:hover`.
        assert_eq!(mini(minify_css, "a :hover { x: y }"), "a :hover{x:y}");
    }

    #[test]
    fn css_strings_untouched() {
        assert_eq!(
            mini(minify_css, "a { content: \"  /* not a comment */  \" }"),
            "a{content:\"  /* not a comment */  \"}"
        );
    }

    #[test]
    fn css_calc_operators_keep_spaces() {
        assert_eq!(
            mini(minify_css, "a { width: calc(100% - 2rem) }"),
            "a{width:calc(100% - 2rem)}"
        );
    }

    #[test]
    fn css_unterminated_comment_is_error() {
        assert!(matches!(
            minify_css(b"a { } /* dangling"),
            Err(MinifyError::Unterminated(_))
        ));
    }

    // =========================================================================
    // JavaScript
    // =========================================================================

    #[test]
    fn js_line_comments_removed() {
        assert_eq!(
            mini(minify_js, "let a = 1; // count\nlet b = 2;\n"),
            "let a = 1;let b = 2;"
        );
    }

    #[test]
    fn js_block_comments_removed() {
        assert_eq!(mini(minify_js, "a /* gone */ b"), "a b");
    }

    #[test]
    fn js_block_comment_with_newline_keeps_line_break() {
        // A multi-line comment is a line terminator for ASI.
        assert_eq!(mini(minify_js, "a = b /* x\ny */ c"), "a = b\nc");
    }

    #[test]
    fn js_indentation_stripped_newlines_kept() {
        assert_eq!(
            mini(minify_js, "function f() {\n    return 1\n}\n"),
            "function f(){return 1}"
        );
    }

    #[test]
    fn js_strings_preserved() {
        assert_eq!(
            mini(minify_js, "let s = \"a // not comment\";"),
            "let s = \"a // not comment\";"
        );
        assert_eq!(mini(minify_js, "let t = '/* nope */';"), "let t = '/* nope */';");
    }

    #[test]
    fn js_template_text_preserved_interpolation_minified() {
        assert_eq!(
            mini(minify_js, "let t = `keep   ${ x /* gone */ } spacing`;"),
            "let t = `keep   ${x} spacing`;"
        );
    }

    #[test]
    fn js_regex_not_mistaken_for_comment() {
        assert_eq!(
            mini(minify_js, "let r = /a\\/*b/g; // trailing\n"),
            "let r = /a\\/*b/g;"
        );
    }

    #[test]
    fn js_division_not_mistaken_for_regex() {
        assert_eq!(mini(minify_js, "x = a / b / c;"), "x = a / b / c;");
    }

    #[test]
    fn js_regex_after_return() {
        assert_eq!(mini(minify_js, "return /ab/.test(s)"), "return /ab/.test(s)");
    }

    #[test]
    fn js_unterminated_block_comment_is_error() {
        assert!(matches!(
            minify_js(b"a /* forever"),
            Err(MinifyError::Unterminated(_))
        ));
    }

    // =========================================================================
    // JSON
    // =========================================================================

    #[test]
    fn json_reencoded_compact() {
        assert_eq!(
            mini(minify_json, "{\n  \"a\": [1, 2, 3],\n  \"b\": \"x\"\n}\n"),
            "{\"a\":[1,2,3],\"b\":\"x\"}"
        );
    }

    #[test]
    fn json_invalid_input_is_error() {
        assert!(matches!(
            minify_json(b"{broken"),
            Err(MinifyError::Json(_))
        ));
    }
}
