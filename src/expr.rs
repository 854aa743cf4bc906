//! Boolean SOP/POS expression engine: lexer, normalization, implicit-AND
//! insertion, shunting-yard to RPN, stack evaluation, and canonicalization.
//!
//! Mirrors the shape of [`crate::bits`]'s don't-care handling — the engine
//! never rejects malformed input at the lexer stage; tokens it can't make
//! sense of either fall out silently (an unattached postfix `'`) or surface
//! later as an [`EvalError`] once evaluation actually needs them.

use indexmap::IndexMap;

/// Error raised while evaluating a token stream against an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        EvalError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One AND/OR operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    And,
    Or,
}

/// A normalized token: pre-/post-negation has already been folded onto
/// variables, but an unattached prefix `~` (e.g. in `~(A+B)`) remains its own
/// token — this is tolerated-but-ambiguous source behavior, preserved
/// intentionally rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Var { name: String, negated: bool },
    Op(Op),
    Not,
    LParen,
    RParen,
}

/// Raw lexer token, before negation-folding and implicit-AND insertion.
#[derive(Debug, Clone, PartialEq)]
enum RawToken {
    Var(String),
    Op(Op),
    NotPrefix,
    NotPostfix,
    LParen,
    RParen,
}

/// Strip the combining overline (U+0305) and split into raw tokens.
/// Single-character operators: `+`, `*`, `~`, `'`, `(`, `)`. A variable is a
/// maximal run of `[alnum _ ^]`. Anything else (stray punctuation) is
/// silently dropped, matching the reference lexer.
fn lex(raw: &str) -> Vec<RawToken> {
    let cleaned: String = raw.chars().filter(|&c| c != '\u{0305}').collect();
    let chars: Vec<char> = cleaned.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => {
                tokens.push(RawToken::Op(Op::Or));
                i += 1;
            }
            '*' => {
                tokens.push(RawToken::Op(Op::And));
                i += 1;
            }
            '~' => {
                tokens.push(RawToken::NotPrefix);
                i += 1;
            }
            '\'' => {
                tokens.push(RawToken::NotPostfix);
                i += 1;
            }
            '(' => {
                tokens.push(RawToken::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(RawToken::RParen);
                i += 1;
            }
            _ if c.is_alphanumeric() || c == '_' || c == '^' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '^')
                {
                    i += 1;
                }
                tokens.push(RawToken::Var(chars[start..i].iter().collect()));
            }
            _ => {
                i += 1;
            }
        }
    }
    tokens
}

/// Lex and fold pre-/post-negation onto variable tokens. An unattached
/// prefix `~` (not immediately followed by a variable) survives as
/// [`Token::Not`]; an unattached postfix `'` is simply dropped.
pub fn normalize(raw: &str) -> Vec<Token> {
    let tokens = lex(raw);
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            RawToken::Var(name) => {
                let mut negated = i > 0 && tokens[i - 1] == RawToken::NotPrefix;
                if i + 1 < tokens.len() && tokens[i + 1] == RawToken::NotPostfix {
                    negated = true;
                    i += 1;
                }
                out.push(Token::Var {
                    name: name.clone(),
                    negated,
                });
            }
            RawToken::NotPrefix => {
                let next_is_var = matches!(tokens.get(i + 1), Some(RawToken::Var(_)));
                if !next_is_var {
                    out.push(Token::Not);
                }
            }
            RawToken::NotPostfix => {}
            RawToken::Op(op) => out.push(Token::Op(*op)),
            RawToken::LParen => out.push(Token::LParen),
            RawToken::RParen => out.push(Token::RParen),
        }
        i += 1;
    }
    out
}

/// Insert an implicit AND between every adjacent pair of tokens where the
/// left is a variable or `)` and the right is a variable, `~`, or `(`.
pub fn insert_implicit_and(tokens: &[Token]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len() * 2);
    for (idx, tk) in tokens.iter().enumerate() {
        out.push(tk.clone());
        let is_left = matches!(tk, Token::Var { .. } | Token::RParen);
        let is_right = matches!(
            tokens.get(idx + 1),
            Some(Token::Var { .. }) | Some(Token::Not) | Some(Token::LParen)
        );
        if is_left && is_right {
            out.push(Token::Op(Op::And));
        }
    }
    out
}

/// Precedence: `~` = 3 (right-assoc, unary), `*` = 2 (left), `+` = 1 (left).
fn precedence(op: &Token) -> u8 {
    match op {
        Token::Not => 3,
        Token::Op(Op::And) => 2,
        Token::Op(Op::Or) => 1,
        _ => 0,
    }
}

/// Shunting-yard conversion of a (implicit-AND-expanded) token stream to RPN.
/// Postfix `'` has already been folded onto variables by [`normalize`]; a
/// bare [`Token::Not`] is treated identically whether it came from a prefix
/// `~` or (historically) a postfix `'`.
pub fn to_rpn(tokens: &[Token]) -> Vec<Token> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut ops: Vec<Token> = Vec::new();
    for tk in tokens {
        match tk {
            Token::Var { .. } => output.push(tk.clone()),
            Token::Not => {
                while let Some(top) = ops.last() {
                    if matches!(top, Token::LParen) || precedence(top) < precedence(tk) {
                        break;
                    }
                    output.push(ops.pop().unwrap());
                }
                ops.push(Token::Not);
            }
            Token::Op(op) => {
                while let Some(top) = ops.last() {
                    if matches!(top, Token::LParen) {
                        break;
                    }
                    let top_prec = precedence(top);
                    let this_prec = precedence(tk);
                    // `*`/`+` are left-assoc; `~` never reaches this branch.
                    if top_prec > this_prec
                        || (top_prec == this_prec && matches!(op, Op::And | Op::Or))
                    {
                        output.push(ops.pop().unwrap());
                    } else {
                        break;
                    }
                }
                ops.push(Token::Op(*op));
            }
            Token::LParen => ops.push(Token::LParen),
            Token::RParen => {
                while let Some(top) = ops.last() {
                    if matches!(top, Token::LParen) {
                        break;
                    }
                    output.push(ops.pop().unwrap());
                }
                ops.pop(); // discard the matching '('
            }
        }
    }
    while let Some(op) = ops.pop() {
        output.push(op);
    }
    output
}

/// Lowercase, strip whitespace and the combining overline — the fallback
/// lookup used when an assignment doesn't have an exact-case variable name.
pub fn normalize_var_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{0305}')
        .collect::<String>()
        .to_lowercase()
}

/// Evaluate an RPN token stream against an assignment function. The
/// assignment is tried under the literal variable name first, then under its
/// normalized form. A missing variable or stack underflow is an
/// [`EvalError`].
pub fn evaluate(rpn: &[Token], assignment: &dyn Fn(&str) -> Option<bool>) -> Result<bool, EvalError> {
    let lookup = |name: &str| -> Option<bool> {
        assignment(name).or_else(|| assignment(&normalize_var_name(name)))
    };
    let mut stack: Vec<bool> = Vec::new();
    for tk in rpn {
        match tk {
            Token::Var { name, negated } => {
                let value = lookup(name).ok_or_else(|| {
                    EvalError::new(format!("unknown variable '{name}' in expression"))
                })?;
                stack.push(if *negated { !value } else { value });
            }
            Token::Not => {
                let top = stack.pop().ok_or_else(|| EvalError::new("invalid expression"))?;
                stack.push(!top);
            }
            Token::Op(op) => {
                let b = stack.pop().ok_or_else(|| EvalError::new("invalid expression"))?;
                let a = stack.pop().ok_or_else(|| EvalError::new("invalid expression"))?;
                stack.push(match op {
                    Op::And => a && b,
                    Op::Or => a || b,
                });
            }
            Token::LParen | Token::RParen => {
                return Err(EvalError::new("invalid expression"));
            }
        }
    }
    if stack.len() != 1 {
        return Err(EvalError::new("invalid expression"));
    }
    Ok(stack.pop().unwrap())
}

/// Parse a raw expression string all the way to an evaluatable RPN stream.
pub fn parse_to_rpn(raw: &str) -> Vec<Token> {
    let normalized = normalize(raw);
    let with_and = insert_implicit_and(&normalized);
    to_rpn(&with_and)
}

/// Render a normalized (pre-RPN, pre-implicit-AND) token stream back to
/// text: `~` prefix for negated literals, ` + ` around OR, juxtaposition for
/// AND, bare parens, single spaces between adjacent operands.
pub fn canonicalize(tokens: &[Token]) -> String {
    #[derive(PartialEq)]
    enum Prev {
        None,
        Var,
        Op,
        Not,
        Open,
        Close,
    }
    let mut out = String::new();
    let mut prev = Prev::None;
    for tk in tokens {
        match tk {
            Token::Var { name, negated } => {
                if matches!(prev, Prev::Var | Prev::Close) {
                    out.push(' ');
                }
                if *negated {
                    out.push('~');
                }
                out.push_str(name);
                prev = Prev::Var;
            }
            Token::Op(Op::Or) => {
                out.push_str(" + ");
                prev = Prev::Op;
            }
            Token::Op(Op::And) => {
                out.push(' ');
                prev = Prev::Op;
            }
            Token::Not => {
                out.push('~');
                prev = Prev::Not;
            }
            Token::LParen => {
                if matches!(prev, Prev::Var | Prev::Close) {
                    out.push(' ');
                }
                out.push('(');
                prev = Prev::Open;
            }
            Token::RParen => {
                out.push(')');
                prev = Prev::Close;
            }
        }
    }
    out.trim().to_string()
}

/// Split a normalized token stream on top-level `+` (depth-0 only; `(`
/// increases depth, `)` decreases). Sections with no variable token are
/// dropped (they contribute nothing, matching the reference behavior of
/// silently discarding empty/operator-only sections).
pub fn split_sections(tokens: &[Token]) -> Vec<Vec<Token>> {
    let mut sections = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0i32;
    let mut push_current = |current: &mut Vec<Token>, sections: &mut Vec<Vec<Token>>| {
        if current.iter().any(|t| matches!(t, Token::Var { .. })) {
            sections.push(std::mem::take(current));
        } else {
            current.clear();
        }
    };
    for tk in tokens {
        if matches!(tk, Token::Op(Op::Or)) && depth == 0 {
            push_current(&mut current, &mut sections);
            continue;
        }
        match tk {
            Token::LParen => depth += 1,
            Token::RParen => depth = (depth - 1).max(0),
            _ => {}
        }
        current.push(tk.clone());
    }
    push_current(&mut current, &mut sections);
    sections
}

/// Collect a product term's `(normalized name, polarity)` literals. Returns
/// `None` if the term is contradictory (contains both `x` and `~x`).
pub fn term_literals(section: &[Token]) -> Option<IndexMap<String, bool>> {
    let mut literals: IndexMap<String, bool> = IndexMap::new();
    for tk in section {
        if let Token::Var { name, negated } = tk {
            let key = normalize_var_name(name);
            let polarity = !negated;
            if let Some(&existing) = literals.get(&key) {
                if existing != polarity {
                    return None;
                }
            }
            literals.insert(key, polarity);
        }
    }
    Some(literals)
}

/// Expression cost per §4.5: total literal count (every variable token
/// across every term) and number of non-empty terms.
pub fn cost(tokens: &[Token]) -> (usize, usize) {
    let sections = split_sections(tokens);
    let literal_count: usize = sections
        .iter()
        .map(|s| s.iter().filter(|t| matches!(t, Token::Var { .. })).count())
        .sum();
    (literal_count, sections.len())
}
