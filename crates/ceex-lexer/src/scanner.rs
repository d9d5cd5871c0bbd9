use crate::token::{
    is_raw_text_element, is_void_element, AttrValue, HostMarker, Position, TagKind, Token,
    TokenKind, DEFAULT_SLOT, NO_CURLY_ATTRIBUTE,
};
use crate::LexerError;

/// Characters that end a tag name. A `<` directly followed by one of them
/// (or by end of input) has no tag name.
const TAG_NAME_STOP: &[char] = &[' ', '\t', '\n', '\r', '\x0c', '"', '\'', '=', '>', '/'];

/// Characters that end an attribute name.
const ATTR_NAME_STOP: &[char] = &[' ', '\t', '\n', '\r', '\x0c', '"', '\'', '=', '>', '/', '{'];

const MIXED_INTERPOLATION_HINT: &str = "Host-expression tags such as <%= ... %> can only be used in the body of a tag.\n\
Inside tag attributes and inside curly interpolation, write the expression between\n\
curly braces instead, for example `class={@class}` or `{@value}`.";

/// Whether `{` starts an interpolation in the current body.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Curly {
    Enabled,
    /// Disabled by `ceex-no-curly-interpolation` on `tag` until that tag closes.
    /// `depth` counts nested tags with the same name.
    Disabled { tag: String, depth: usize },
}

/// The tag whose attribute list is being scanned.
struct OpenTag {
    name: String,
    kind: TagKind,
    start: Position,
    no_curly: bool,
}

impl OpenTag {
    fn display(&self) -> String {
        match self.kind {
            TagKind::Element | TagKind::RemoteComponent => format!("<{}>", self.name),
            TagKind::LocalComponent => format!("<.{}>", self.name),
            TagKind::Slot => format!("<:{}>", self.name),
        }
    }
}

/// Template source scanner.
///
/// A state machine over the source characters. Each state is a method:
/// text, tag name start, attribute name or tag end, attribute value start,
/// quoted value, expression value, root attribute, closing tag name,
/// comment, doctype and raw-text body.
///
/// Text is accumulated in a buffer and flushed as a single `Text` token
/// whenever another construct begins.
pub struct Scanner<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    offset: usize,
    line: usize,
    column: usize,
    indentation: usize,
    tokens: Vec<Token>,
    text: String,
    text_start: Option<Position>,
    curly: Curly,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner starting at line 1, column 1.
    pub fn new(source: &'a str) -> Self {
        Self::with_origin(source, 1, 0)
    }

    /// Create a scanner whose first line is `line` and whose lines are all
    /// indented by `indentation` columns in the file they came from.
    pub fn with_origin(source: &'a str, line: usize, indentation: usize) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            offset: 0,
            line,
            column: indentation + 1,
            indentation,
            tokens: Vec::new(),
            text: String::new(),
            text_start: None,
            curly: Curly::Enabled,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        Scanner::new(source).scan()
    }

    /// Tokenize with an explicit starting line and indentation.
    pub fn tokenize_at(
        source: &str,
        line: usize,
        indentation: usize,
    ) -> Result<Vec<Token>, LexerError> {
        Scanner::with_origin(source, line, indentation).scan()
    }

    /// Run the scanner to completion. The last token is always `Eof`.
    pub fn scan(mut self) -> Result<Vec<Token>, LexerError> {
        while !self.is_at_end() {
            self.scan_text()?;
        }
        self.flush_text();
        let position = self.position();
        self.tokens.push(Token::new(TokenKind::Eof, position));
        Ok(self.tokens)
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Scan one step of body text, dispatching to the construct that starts
    /// at the current character.
    fn scan_text(&mut self) -> Result<(), LexerError> {
        match self.peek() {
            '<' if self.starts_with("<%%") => {
                self.push_text_str("<%");
                self.advance_n(3);
                Ok(())
            }
            '<' if self.starts_with("<%") => {
                self.flush_text();
                self.scan_host_expr()
            }
            '<' if self.starts_with("<!--") => {
                self.flush_text();
                self.scan_comment()
            }
            '<' if self.peek_next() == '!' => {
                self.flush_text();
                self.scan_doctype()
            }
            '<' if self.peek_next() == '/' => {
                self.flush_text();
                self.scan_tag_close_name()
            }
            '<' => {
                self.flush_text();
                self.scan_tag_name_start()
            }
            '{' if self.curly == Curly::Enabled => {
                self.flush_text();
                let start = self.position();
                let code = self.scan_braced(start)?;
                self.tokens.push(Token::new(
                    TokenKind::HostExpr {
                        marker: HostMarker::Curly,
                        code,
                    },
                    start,
                ));
                Ok(())
            }
            c => {
                self.push_text(c);
                self.advance();
                Ok(())
            }
        }
    }

    /// Scan `<% ... %>`, `<%= ... %>` or `<%# ... %>`.
    fn scan_host_expr(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        self.advance_n(2);

        let marker = match self.peek() {
            '=' => {
                self.advance();
                Some(HostMarker::Output)
            }
            '#' => {
                self.advance();
                None
            }
            _ => Some(HostMarker::Exec),
        };

        let mut code = String::new();
        loop {
            if self.is_at_end() {
                return Err(LexerError::new(
                    "missing closing `%>` for host expression",
                    start,
                ));
            }
            if self.starts_with("%>") {
                self.advance_n(2);
                break;
            }
            code.push(self.peek());
            self.advance();
        }

        if let Some(marker) = marker {
            self.tokens
                .push(Token::new(TokenKind::HostExpr { marker, code }, start));
        }
        Ok(())
    }

    /// Scan `<!-- ... -->`, kept verbatim.
    fn scan_comment(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        let begin = self.offset;
        self.advance_n(4);

        while !self.starts_with("-->") {
            if self.is_at_end() {
                return Err(LexerError::new(
                    "missing closing `-->` for comment",
                    start,
                ));
            }
            self.advance();
        }
        self.advance_n(3);

        let content = self.source[begin..self.offset].to_string();
        self.tokens.push(Token::new(TokenKind::Comment(content), start));
        Ok(())
    }

    /// Scan `<!DOCTYPE ...>` and any other `<!` declaration, kept verbatim.
    fn scan_doctype(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        let begin = self.offset;
        self.advance_n(2);

        while self.peek() != '>' {
            if self.is_at_end() {
                return Err(LexerError::new("missing closing `>` for doctype", start));
            }
            self.advance();
        }
        self.advance();

        let content = self.source[begin..self.offset].to_string();
        self.tokens.push(Token::new(TokenKind::Doctype(content), start));
        Ok(())
    }

    // =========================================================================
    // Opening tags
    // =========================================================================

    /// Scan `<name` and hand over to the attribute list.
    fn scan_tag_name_start(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        self.advance(); // consume `<`

        let raw = self.read_while(|c| !TAG_NAME_STOP.contains(&c));
        if raw.is_empty() {
            return Err(LexerError::new(
                "missing tag name after <. If you meant to write a literal <, use &lt; instead",
                start,
            ));
        }

        let (name, kind) = classify_tag(&raw, start)?;
        self.tokens.push(Token::new(
            TokenKind::TagOpenStart {
                name: name.clone(),
                kind,
            },
            start,
        ));

        let mut tag = OpenTag {
            name,
            kind,
            start,
            no_curly: false,
        };
        self.scan_attr_name_or_tag_end(&mut tag)
    }

    /// Scan attributes until `>` or `/>`.
    fn scan_attr_name_or_tag_end(&mut self, tag: &mut OpenTag) -> Result<(), LexerError> {
        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                return Err(self.unclosed_tag(tag));
            }

            match self.peek() {
                '>' => {
                    self.emit(TokenKind::TagOpenEnd {
                        self_closing: false,
                    });
                    self.advance();
                    return self.enter_body(tag);
                }
                '/' if self.peek_next() == '>' => {
                    self.emit(TokenKind::TagOpenEnd { self_closing: true });
                    self.advance_n(2);
                    return Ok(());
                }
                '/' => {
                    return Err(LexerError::new(
                        format!("expected `>` after `/` in tag {}", tag.display()),
                        self.position(),
                    ));
                }
                '{' => self.scan_root_attr_expr()?,
                '<' if self.starts_with("<%") => {
                    return Err(self.host_expr_in_tag(tag));
                }
                '"' | '\'' | '=' => {
                    return Err(LexerError::new(
                        format!("expected attribute name in tag {}", tag.display()),
                        self.position(),
                    ));
                }
                _ => {
                    let start = self.position();
                    let name = self.read_while(|c| !ATTR_NAME_STOP.contains(&c));
                    if name == NO_CURLY_ATTRIBUTE {
                        tag.no_curly = true;
                    }
                    self.tokens
                        .push(Token::new(TokenKind::AttrName(name), start));
                    self.scan_attr_value_start(tag, start)?;
                }
            }
        }
    }

    /// After an attribute name: `="..."`, `={...}` or nothing (boolean).
    fn scan_attr_value_start(
        &mut self,
        tag: &OpenTag,
        name_start: Position,
    ) -> Result<(), LexerError> {
        self.skip_whitespace();

        if self.peek() != '=' || self.is_at_end() {
            self.tokens.push(Token::new(
                TokenKind::AttrValue(AttrValue::Boolean),
                name_start,
            ));
            return Ok(());
        }

        self.advance(); // consume `=`
        self.skip_whitespace();

        if self.is_at_end() {
            return Err(self.unclosed_tag(tag));
        }

        match self.peek() {
            quote @ ('"' | '\'') => self.scan_attr_value_quoted(quote),
            '{' => self.scan_attr_value_expr(),
            '<' if self.starts_with("<%") => Err(self.host_expr_in_tag(tag)),
            _ => Err(LexerError::new(
                "invalid attribute value after `=`. Expected either a value between quotes \
                 (such as \"value\" or 'value') or an expression between curly braces (such as `{expr}`)",
                self.position(),
            )),
        }
    }

    /// Scan a quoted attribute value. Content is kept verbatim, unescaped.
    fn scan_attr_value_quoted(&mut self, quote: char) -> Result<(), LexerError> {
        let start = self.position();
        self.advance(); // consume opening quote

        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return Err(LexerError::new(
                    format!("missing closing `{quote}` for attribute value"),
                    start,
                ));
            }
            if self.peek() == quote {
                break;
            }
            value.push(self.peek());
            self.advance();
        }
        self.advance(); // consume closing quote

        self.tokens.push(Token::new(
            TokenKind::AttrValue(AttrValue::Static { value, quote }),
            start,
        ));
        Ok(())
    }

    /// Scan `={expr}`.
    fn scan_attr_value_expr(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        let code = self.scan_braced(start)?;
        self.tokens
            .push(Token::new(TokenKind::AttrValue(AttrValue::Expr(code)), start));
        Ok(())
    }

    /// Scan a nameless `{expr}` in attribute position.
    fn scan_root_attr_expr(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        let code = self.scan_braced(start)?;
        self.tokens.push(Token::new(TokenKind::RootAttr(code), start));
        Ok(())
    }

    /// Scan `{...}` counting brace depth, so nested braces do not end the
    /// expression early. String literals are skipped as a whole.
    /// Returns the code between the outer braces.
    fn scan_braced(&mut self, start: Position) -> Result<String, LexerError> {
        self.advance(); // consume `{`

        let mut code = String::new();
        let mut depth = 1;

        loop {
            if self.is_at_end() {
                return Err(LexerError::new("missing closing `}` for expression", start));
            }

            let c = self.peek();
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(code);
                    }
                }
                '"' => {
                    self.scan_string_literal(&mut code, start)?;
                    continue;
                }
                '<' if self.starts_with("<%") => {
                    return Err(LexerError::new(
                        "host-expression tags are not allowed inside curly interpolation",
                        self.position(),
                    )
                    .with_hint(MIXED_INTERPOLATION_HINT));
                }
                _ => {}
            }
            code.push(c);
            self.advance();
        }
    }

    /// Copy a double-quoted string literal (including its quotes) into `code`.
    fn scan_string_literal(&mut self, code: &mut String, start: Position) -> Result<(), LexerError> {
        code.push('"');
        self.advance();

        loop {
            if self.is_at_end() {
                return Err(LexerError::new("missing closing `}` for expression", start));
            }
            let c = self.peek();
            code.push(c);
            self.advance();
            match c {
                '\\' if !self.is_at_end() => {
                    code.push(self.peek());
                    self.advance();
                }
                '"' => return Ok(()),
                _ => {}
            }
        }
    }

    /// Called after `>` of an opening tag: raw-text bodies and curly
    /// interpolation switches.
    fn enter_body(&mut self, tag: &OpenTag) -> Result<(), LexerError> {
        if tag.kind == TagKind::Element && is_raw_text_element(&tag.name) {
            return self.scan_raw_text_body(tag);
        }
        if tag.kind == TagKind::Element && is_void_element(&tag.name) {
            return Ok(());
        }

        if self.curly == Curly::Enabled && tag.no_curly {
            self.curly = Curly::Disabled {
                tag: tag.name.clone(),
                depth: 0,
            };
        } else if let Curly::Disabled { tag: name, depth } = &mut self.curly {
            if *name == tag.name {
                *depth += 1;
            }
        }
        Ok(())
    }

    /// Scan the body of `<script>`/`<style>` up to (not including) the
    /// literal closing tag. Only host-expression tags stay active.
    fn scan_raw_text_body(&mut self, tag: &OpenTag) -> Result<(), LexerError> {
        let closing = format!("</{}", tag.name);

        loop {
            if self.is_at_end() {
                return Err(LexerError::new(
                    format!("missing closing tag `</{}>` for {}", tag.name, tag.display()),
                    tag.start,
                ));
            }

            if self.starts_with(&closing) {
                let after = self.peek_at(closing.chars().count());
                if after == '>' || after.is_whitespace() {
                    self.flush_text();
                    return Ok(());
                }
            }

            if self.starts_with("<%%") {
                self.push_text_str("<%");
                self.advance_n(3);
            } else if self.starts_with("<%") {
                self.flush_text();
                self.scan_host_expr()?;
            } else {
                let c = self.peek();
                self.push_text(c);
                self.advance();
            }
        }
    }

    // =========================================================================
    // Closing tags
    // =========================================================================

    /// Scan `</name>`.
    fn scan_tag_close_name(&mut self) -> Result<(), LexerError> {
        let start = self.position();
        self.advance_n(2); // consume `</`

        let raw = self.read_while(|c| !TAG_NAME_STOP.contains(&c));
        if raw.is_empty() {
            return Err(LexerError::new("missing tag name after </", start));
        }

        let (name, kind) = classify_tag(&raw, start)?;

        if kind == TagKind::Element && is_void_element(&name) {
            return Err(LexerError::new(
                format!("`<{name}>` is a void element and cannot have a closing tag `</{name}>`"),
                start,
            ));
        }

        self.skip_whitespace();
        if self.peek() != '>' || self.is_at_end() {
            return Err(LexerError::new(
                format!("missing closing `>` for tag `</{raw}>`"),
                start,
            ));
        }
        self.advance();

        let reenable = match &mut self.curly {
            Curly::Disabled { tag, depth } if *tag == name => {
                if *depth == 0 {
                    true
                } else {
                    *depth -= 1;
                    false
                }
            }
            _ => false,
        };
        if reenable {
            self.curly = Curly::Enabled;
        }

        self.tokens
            .push(Token::new(TokenKind::TagClose { name, kind }, start));
        Ok(())
    }

    // =========================================================================
    // Errors
    // =========================================================================

    fn unclosed_tag(&self, tag: &OpenTag) -> LexerError {
        LexerError::new(
            format!("missing closing `>` for tag {}", tag.display()),
            tag.start,
        )
    }

    fn host_expr_in_tag(&self, tag: &OpenTag) -> LexerError {
        LexerError::new(
            format!(
                "host-expression tags are not allowed inside the attributes of {}",
                tag.display()
            ),
            self.position(),
        )
        .with_hint(MIXED_INTERPOLATION_HINT)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn position(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }

    fn emit(&mut self, kind: TokenKind) {
        let position = self.position();
        self.tokens.push(Token::new(kind, position));
    }

    fn push_text(&mut self, c: char) {
        if self.text_start.is_none() {
            self.text_start = Some(self.position());
        }
        self.text.push(c);
    }

    fn push_text_str(&mut self, s: &str) {
        if self.text_start.is_none() {
            self.text_start = Some(self.position());
        }
        self.text.push_str(s);
    }

    fn flush_text(&mut self) {
        if let Some(start) = self.text_start.take() {
            let text = std::mem::take(&mut self.text);
            self.tokens.push(Token::new(TokenKind::Text(text), start));
        }
    }

    fn read_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while !self.is_at_end() && keep(self.peek()) {
            out.push(self.peek());
            self.advance();
        }
        out
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.source[self.offset..].starts_with(s)
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, n: usize) -> char {
        self.chars.get(self.pos + n).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        if let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            self.offset += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = self.indentation + 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

/// Split a raw tag name into its bare name and kind, validating component
/// and slot naming rules.
fn classify_tag(raw: &str, start: Position) -> Result<(String, TagKind), LexerError> {
    let starts_lower = |s: &str| s.starts_with(|c: char| c.is_ascii_lowercase() || c == '_');

    if let Some(rest) = raw.strip_prefix('.') {
        if !starts_lower(rest) {
            return Err(LexerError::new(
                format!(
                    "invalid local component name `<.{rest}>`. The name after the dot must start with a lowercase letter"
                ),
                start,
            ));
        }
        return Ok((rest.to_string(), TagKind::LocalComponent));
    }

    if let Some(rest) = raw.strip_prefix(':') {
        if !starts_lower(rest) {
            return Err(LexerError::new(
                format!("invalid slot name `<:{rest}>`. Slot names must start with a lowercase letter"),
                start,
            ));
        }
        if rest == DEFAULT_SLOT {
            return Err(LexerError::new(
                format!(
                    "the slot name `:{DEFAULT_SLOT}` is reserved for the default slot and cannot be declared explicitly"
                ),
                start,
            ));
        }
        return Ok((rest.to_string(), TagKind::Slot));
    }

    if raw.starts_with(|c: char| c.is_ascii_uppercase()) {
        let function = raw.rsplit('.').next().unwrap_or_default();
        if !raw.contains('.') || !starts_lower(function) {
            return Err(LexerError::new(
                format!("invalid tag `<{raw}>`. Remote components must be written as `<Module.function>`"),
                start,
            ));
        }
        return Ok((raw.to_string(), TagKind::RemoteComponent));
    }

    Ok((raw.to_string(), TagKind::Element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: tokenize and return token kinds (ignoring positions).
    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn error(source: &str) -> LexerError {
        Scanner::tokenize(source).unwrap_err()
    }

    fn text(s: &str) -> TokenKind {
        TokenKind::Text(s.into())
    }

    fn open(name: &str, kind: TagKind) -> TokenKind {
        TokenKind::TagOpenStart {
            name: name.into(),
            kind,
        }
    }

    fn close(name: &str, kind: TagKind) -> TokenKind {
        TokenKind::TagClose {
            name: name.into(),
            kind,
        }
    }

    fn end(self_closing: bool) -> TokenKind {
        TokenKind::TagOpenEnd { self_closing }
    }

    fn curly(code: &str) -> TokenKind {
        TokenKind::HostExpr {
            marker: HostMarker::Curly,
            code: code.into(),
        }
    }

    // =========================================================================
    // Text and simple tags
    // =========================================================================

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(kinds("hello\nworld"), vec![text("hello\nworld"), TokenKind::Eof]);
    }

    #[test]
    fn test_element_with_text() {
        assert_eq!(
            kinds("<div>hi</div>"),
            vec![
                open("div", TagKind::Element),
                end(false),
                text("hi"),
                close("div", TagKind::Element),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_self_closing_tag() {
        assert_eq!(
            kinds("<br/>"),
            vec![open("br", TagKind::Element), end(true), TokenKind::Eof]
        );
    }

    #[test]
    fn test_closing_tag_allows_whitespace_before_gt() {
        assert_eq!(
            kinds("<p></p  >"),
            vec![
                open("p", TagKind::Element),
                end(false),
                close("p", TagKind::Element),
                TokenKind::Eof,
            ]
        );
    }

    // =========================================================================
    // Tag kinds
    // =========================================================================

    #[test]
    fn test_remote_component() {
        assert_eq!(
            kinds("<Ui.Forms.input />")[0],
            open("Ui.Forms.input", TagKind::RemoteComponent)
        );
    }

    #[test]
    fn test_local_component() {
        assert_eq!(
            kinds("<.button></.button>"),
            vec![
                open("button", TagKind::LocalComponent),
                end(false),
                close("button", TagKind::LocalComponent),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_slot_entry() {
        assert_eq!(kinds("<:header>")[0], open("header", TagKind::Slot));
    }

    #[test]
    fn test_invalid_local_component_name() {
        let err = error("<.Button>");
        assert!(err.message.contains("invalid local component name"));
        assert_eq!(err.position, Position::new(0, 1, 1));
    }

    #[test]
    fn test_invalid_slot_name() {
        assert!(error("<:Header>").message.contains("invalid slot name"));
    }

    #[test]
    fn test_reserved_slot_name() {
        let err = error("<.card><:inner_block>x</:inner_block></.card>");
        assert!(err.message.contains("reserved"));
        assert_eq!(err.position.column, 8);
    }

    #[test]
    fn test_remote_component_needs_function() {
        assert!(error("<Button>").message.contains("invalid tag `<Button>`"));
        assert!(error("<Ui.Button>").message.contains("invalid tag"));
    }

    #[test]
    fn test_missing_tag_name() {
        for source in ["a < b", "<", "<>", "<=", "<\"x\"", "<\n"] {
            let err = error(source);
            assert!(
                err.message.starts_with("missing tag name after <"),
                "{source:?}: {}",
                err.message
            );
        }
    }

    #[test]
    fn test_missing_closing_tag_name() {
        assert_eq!(error("</>").message, "missing tag name after </");
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    #[test]
    fn test_static_attributes_keep_quotes() {
        assert_eq!(
            kinds("<a href=\"/x?a=1&b=<2>\" title='it\"s'>"),
            vec![
                open("a", TagKind::Element),
                TokenKind::AttrName("href".into()),
                TokenKind::AttrValue(AttrValue::Static {
                    value: "/x?a=1&b=<2>".into(),
                    quote: '"',
                }),
                TokenKind::AttrName("title".into()),
                TokenKind::AttrValue(AttrValue::Static {
                    value: "it\"s".into(),
                    quote: '\'',
                }),
                end(false),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_boolean_attribute() {
        assert_eq!(
            kinds("<input disabled>"),
            vec![
                open("input", TagKind::Element),
                TokenKind::AttrName("disabled".into()),
                TokenKind::AttrValue(AttrValue::Boolean),
                end(false),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_expression_attribute_counts_braces() {
        assert_eq!(
            kinds("<div data={%{a: %{b: 1}}}>")[2],
            TokenKind::AttrValue(AttrValue::Expr("%{a: %{b: 1}}".into()))
        );
    }

    #[test]
    fn test_expression_attribute_skips_strings() {
        assert_eq!(
            kinds("<div title={\"}\"}>")[2],
            TokenKind::AttrValue(AttrValue::Expr("\"}\"".into()))
        );
    }

    #[test]
    fn test_root_attribute() {
        assert_eq!(
            kinds("<div id=\"a\" {@rest} class=\"b\">"),
            vec![
                open("div", TagKind::Element),
                TokenKind::AttrName("id".into()),
                TokenKind::AttrValue(AttrValue::Static {
                    value: "a".into(),
                    quote: '"',
                }),
                TokenKind::RootAttr("@rest".into()),
                TokenKind::AttrName("class".into()),
                TokenKind::AttrValue(AttrValue::Static {
                    value: "b".into(),
                    quote: '"',
                }),
                end(false),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_special_attribute_names() {
        let k = kinds("<li :for={x <- @xs} :if={x}>");
        assert_eq!(k[1], TokenKind::AttrName(":for".into()));
        assert_eq!(k[2], TokenKind::AttrValue(AttrValue::Expr("x <- @xs".into())));
        assert_eq!(k[3], TokenKind::AttrName(":if".into()));
    }

    #[test]
    fn test_invalid_attribute_value() {
        let err = error("<div class=foo>");
        assert!(err.message.starts_with("invalid attribute value after `=`"));
        assert_eq!(err.position.column, 12);
    }

    #[test]
    fn test_unterminated_quoted_value() {
        let err = error("<div\n  class=\"foo>");
        assert_eq!(err.message, "missing closing `\"` for attribute value");
        assert_eq!((err.position.line, err.position.column), (2, 9));
    }

    #[test]
    fn test_unterminated_expression_value() {
        let err = error("<div class={@a>");
        assert_eq!(err.message, "missing closing `}` for expression");
        assert_eq!(err.position.column, 12);
    }

    #[test]
    fn test_unterminated_tag() {
        let err = error("text <div class=\"a\"");
        assert_eq!(err.message, "missing closing `>` for tag <div>");
        assert_eq!(err.position.column, 6);
    }

    #[test]
    fn test_host_expr_inside_attributes_is_rejected() {
        let err = error("<div class=<%= @a %>>");
        assert!(err.message.contains("not allowed inside the attributes"));
        assert!(err.hint.is_some());
    }

    // =========================================================================
    // Body expressions
    // =========================================================================

    #[test]
    fn test_curly_interpolation() {
        assert_eq!(
            kinds("a {@b} c"),
            vec![text("a "), curly("@b"), text(" c"), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_curly_interpolation() {
        let err = error("x\n  {@b");
        assert_eq!(err.message, "missing closing `}` for expression");
        assert_eq!((err.position.line, err.position.column), (2, 3));
    }

    #[test]
    fn test_host_expression_tags() {
        assert_eq!(
            kinds("<%= @a %><% x %><%# note %>"),
            vec![
                TokenKind::HostExpr {
                    marker: HostMarker::Output,
                    code: " @a ".into(),
                },
                TokenKind::HostExpr {
                    marker: HostMarker::Exec,
                    code: " x ".into(),
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escaped_host_expression_tag() {
        assert_eq!(kinds("a <%% b"), vec![text("a <% b"), TokenKind::Eof]);
    }

    #[test]
    fn test_host_expr_inside_curly_is_rejected() {
        let err = error("{<%= @a %>}");
        assert!(err.message.contains("inside curly interpolation"));
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_unterminated_host_expression() {
        let err = error("<%= @a");
        assert_eq!(err.message, "missing closing `%>` for host expression");
    }

    // =========================================================================
    // Raw text and disabled interpolation
    // =========================================================================

    #[test]
    fn test_script_body_is_raw() {
        assert_eq!(
            kinds("<script>if (a) { b() } <%= @c %></script>"),
            vec![
                open("script", TagKind::Element),
                end(false),
                text("if (a) { b() } "),
                TokenKind::HostExpr {
                    marker: HostMarker::Output,
                    code: " @c ".into(),
                },
                close("script", TagKind::Element),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_style_body_ignores_tags() {
        let k = kinds("<style>a > b { c: d }</style>");
        assert_eq!(k[2], text("a > b { c: d }"));
    }

    #[test]
    fn test_unterminated_script() {
        let err = error("<script>{");
        assert_eq!(err.message, "missing closing tag `</script>` for <script>");
    }

    #[test]
    fn test_no_curly_interpolation_attribute() {
        assert_eq!(
            kinds("<div ceex-no-curly-interpolation><p>{a}</p><%= b %></div>{c}"),
            vec![
                open("div", TagKind::Element),
                TokenKind::AttrName(NO_CURLY_ATTRIBUTE.into()),
                TokenKind::AttrValue(AttrValue::Boolean),
                end(false),
                open("p", TagKind::Element),
                end(false),
                text("{a}"),
                close("p", TagKind::Element),
                TokenKind::HostExpr {
                    marker: HostMarker::Output,
                    code: " b ".into(),
                },
                close("div", TagKind::Element),
                curly("c"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_no_curly_on_void_element_has_no_body() {
        let k = kinds("<br ceex-no-curly-interpolation><p>{a}</p>");
        assert!(k.contains(&curly("a")));
        assert!(!k.contains(&text("{a}")));
    }

    #[test]
    fn test_no_curly_counts_nested_same_tag() {
        let k = kinds("<div ceex-no-curly-interpolation><div></div>{a}</div>{b}");
        assert!(k.contains(&text("{a}")));
        assert!(k.contains(&curly("b")));
    }

    // =========================================================================
    // Void elements
    // =========================================================================

    #[test]
    fn test_void_closing_tag_is_rejected() {
        let err = error("<link>Text</link>");
        assert_eq!(
            err.message,
            "`<link>` is a void element and cannot have a closing tag `</link>`"
        );
        assert_eq!(err.position.column, 11);
    }

    #[test]
    fn test_void_registry() {
        for tag in VOID_ELEMENTS_UNDER_TEST {
            assert!(is_void_element(tag), "{tag}");
            assert!(error(&format!("<{tag}></{tag}>")).message.contains("void element"));
        }
        for tag in ["div", "span", "script", "textarea", "template"] {
            assert!(!is_void_element(tag), "{tag}");
        }
    }

    const VOID_ELEMENTS_UNDER_TEST: &[&str] = &[
        "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen",
        "link", "meta", "param", "source", "track", "wbr",
    ];

    // =========================================================================
    // Comments and doctype
    // =========================================================================

    #[test]
    fn test_comment_kept_verbatim() {
        assert_eq!(
            kinds("<!-- <div> {x} -->"),
            vec![TokenKind::Comment("<!-- <div> {x} -->".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_comment() {
        assert_eq!(error("a <!-- b").message, "missing closing `-->` for comment");
    }

    #[test]
    fn test_doctype() {
        assert_eq!(
            kinds("<!DOCTYPE html>\n")[0],
            TokenKind::Doctype("<!DOCTYPE html>".into())
        );
    }

    // =========================================================================
    // Positions
    // =========================================================================

    #[test]
    fn test_positions() {
        let tokens = Scanner::tokenize("ab\n  <p>é{x}</p>").unwrap();
        assert_eq!(tokens[0].position, Position::new(0, 1, 1));
        assert_eq!(tokens[1].position, Position::new(5, 2, 3)); // <p
        assert_eq!(tokens[3].position, Position::new(8, 2, 6)); // é
        assert_eq!(tokens[4].position, Position::new(10, 2, 7)); // {x}
        assert_eq!(tokens[5].position, Position::new(13, 2, 10)); // </p>
    }

    #[test]
    fn test_origin_line_and_indentation() {
        let tokens = Scanner::tokenize_at("<p>\n</p>", 10, 4).unwrap();
        assert_eq!(tokens[0].position, Position::new(0, 10, 5));
        assert_eq!(tokens[3].position, Position::new(4, 11, 5));
    }
}
