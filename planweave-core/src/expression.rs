use crate::error::{PlanError, Result};

fn is_separator_for_following(c: u8) -> bool {
    matches!(c, b'&' | b'|' | b'+' | b'-' | b'<' | b'>')
}

fn is_separator(c: u8) -> bool {
    matches!(c, b' ' | b'(' | b')' | b',' | b'=' | b'!') || is_separator_for_following(c)
}

fn is_end_of_token_separator(c: u8) -> bool {
    matches!(c, b' ' | b'\n' | b')' | b'(')
}

/// Parsed expression node, shared by the infix str form and the
/// parenthesized PDDL form. `a & b` style chains are kept as a linked
/// `following` expression with its separator.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub name: String,
    pub arguments: Vec<Expression>,
    pub value: String,
    pub is_value_negated: bool,
    pub is_a_function: bool,
    pub separator_to_following: char,
    pub following: Option<Box<Expression>>,
}

impl Expression {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Parse the infix str form: `name(arg, ...)`, `fact=value`,
    /// `!fact`, `a & b`, `equals(x, y)`, comparison and arithmetic tails.
    pub fn from_str(s: &str, pos: &mut usize) -> Result<Expression> {
        let bytes = s.as_bytes();
        let len = bytes.len();
        let mut res = Expression::default();

        // Name.
        let mut begin_of_name = *pos;
        while *pos < len {
            if begin_of_name == *pos {
                if bytes[*pos] == b' ' {
                    *pos += 1;
                    begin_of_name = *pos;
                    continue;
                }
            } else if is_separator(bytes[*pos]) {
                res.name = s[begin_of_name..*pos].to_string();
                break;
            }
            *pos += 1;
        }
        if res.name.is_empty() {
            if begin_of_name == *pos {
                return Err(PlanError::Parse(format!(
                    "predicate is missing in expression: \"{s}\""
                )));
            }
            res.name = s[begin_of_name..*pos].to_string();
        }

        // Arguments.
        if *pos < len && bytes[*pos] == b'(' {
            res.is_a_function = true;
            if *pos + 1 < len && bytes[*pos + 1] != b')' {
                loop {
                    *pos += 1;
                    res.arguments.push(Expression::from_str(s, pos)?);
                    if *pos >= len || bytes[*pos] != b',' {
                        break;
                    }
                }
            } else {
                *pos += 1;
            }
            if *pos < len && bytes[*pos] == b')' {
                *pos += 1;
            } else {
                return Err(PlanError::Parse(format!(
                    "arguments parenthesis is not closed: \"{s}\""
                )));
            }
        }

        // Value.
        if *pos < len && bytes[*pos] == b'!' {
            res.is_value_negated = true;
            *pos += 1;
        }
        if *pos < len && bytes[*pos] == b'=' {
            res.is_a_function = true;
            *pos += 1;
            let begin_of_value = *pos;
            while *pos < len && !is_separator(bytes[*pos]) {
                *pos += 1;
            }
            res.value = s[begin_of_value..*pos].to_string();
        }

        // Following expression.
        while *pos < len {
            if bytes[*pos] == b' ' {
                *pos += 1;
                continue;
            }
            if is_separator_for_following(bytes[*pos]) {
                res.separator_to_following = bytes[*pos] as char;
                *pos += 1;
                res.following = Some(Box::new(Expression::from_str(s, pos)?));
            }
            break;
        }
        Ok(res)
    }

    /// Parse the parenthesized PDDL form: `(name arg ...)` with nested
    /// sub-expressions, or a bare token.
    pub fn from_pddl(s: &str, pos: &mut usize, can_have_following: bool) -> Result<Expression> {
        let bytes = s.as_bytes();
        let len = bytes.len();
        let mut res = Expression::default();
        Expression::skip_spaces(s, pos);
        if *pos >= len {
            return Ok(res);
        }

        if bytes[*pos] == b'(' {
            *pos += 1;
            res.is_a_function = true;
            Expression::skip_spaces(s, pos);
            let begin_of_token = *pos;
            let mut in_name = true;
            while *pos < len {
                if !in_name || is_end_of_token_separator(bytes[*pos]) {
                    if in_name {
                        res.name = s[begin_of_token..*pos].to_string();
                        if res.name.is_empty() {
                            return Expression::from_pddl(s, pos, can_have_following);
                        }
                        Expression::skip_spaces(s, pos);
                        in_name = false;
                        continue;
                    }
                    if bytes[*pos] == b')' {
                        *pos += 1;
                        break;
                    }
                    let pre_pos = *pos;
                    res.arguments
                        .push(Expression::from_pddl(s, pos, can_have_following)?);
                    if *pos > pre_pos {
                        continue;
                    }
                }
                *pos += 1;
            }
        } else {
            res.name = Expression::parse_token(s, pos)?;
        }

        if can_have_following {
            while *pos < len {
                if bytes[*pos] == b' ' {
                    *pos += 1;
                    continue;
                }
                if is_separator_for_following(bytes[*pos]) {
                    res.separator_to_following = bytes[*pos] as char;
                    *pos += 1;
                    res.following = Some(Box::new(Expression::from_pddl(
                        s,
                        pos,
                        can_have_following,
                    )?));
                }
                break;
            }
        }
        Expression::skip_spaces(s, pos);
        Ok(res)
    }

    /// Skip whitespace; `;` comments run to end of line.
    pub fn skip_spaces(s: &str, pos: &mut usize) {
        let bytes = s.as_bytes();
        let len = bytes.len();
        while *pos < len {
            if bytes[*pos] == b';' {
                while *pos < len && bytes[*pos] != b'\n' {
                    *pos += 1;
                }
            } else if bytes[*pos] != b' ' && bytes[*pos] != b'\n' && bytes[*pos] != b'\t' {
                break;
            }
            *pos += 1;
        }
    }

    fn parse_token(s: &str, pos: &mut usize) -> Result<String> {
        let bytes = s.as_bytes();
        let len = bytes.len();
        Expression::skip_spaces(s, pos);
        let begin_of_token = *pos;
        while *pos < len && !is_end_of_token_separator(bytes[*pos]) {
            *pos += 1;
        }
        let res = s[begin_of_token..*pos].to_string();
        if res.is_empty() {
            return Err(PlanError::Parse(format!(
                "empty token in str \"{}\"",
                &s[begin_of_token..]
            )));
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_with_value() {
        let mut pos = 0;
        let exp = Expression::from_str("pred_a(toto)=10", &mut pos).unwrap();
        assert_eq!(exp.name, "pred_a");
        assert_eq!(exp.arguments.len(), 1);
        assert_eq!(exp.arguments[0].name, "toto");
        assert_eq!(exp.value, "10");
        assert!(!exp.is_value_negated);
    }

    #[test]
    fn test_negated_value() {
        let mut pos = 0;
        let exp = Expression::from_str("pred_a(toto)!=10", &mut pos).unwrap();
        assert_eq!(exp.value, "10");
        assert!(exp.is_value_negated);
    }

    #[test]
    fn test_and_chain() {
        let mut pos = 0;
        let exp = Expression::from_str("pred_a & pred_b & pred_c", &mut pos).unwrap();
        assert_eq!(exp.name, "pred_a");
        assert_eq!(exp.separator_to_following, '&');
        let second = exp.following.as_ref().unwrap();
        assert_eq!(second.name, "pred_b");
        assert_eq!(second.following.as_ref().unwrap().name, "pred_c");
    }

    #[test]
    fn test_nested_function() {
        let mut pos = 0;
        let exp = Expression::from_str("assign(pred_a, pred_b(?e))", &mut pos).unwrap();
        assert_eq!(exp.name, "assign");
        assert_eq!(exp.arguments.len(), 2);
        assert_eq!(exp.arguments[1].name, "pred_b");
        assert_eq!(exp.arguments[1].arguments[0].name, "?e");
    }

    #[test]
    fn test_pddl_form() {
        let mut pos = 0;
        let exp = Expression::from_pddl("(= (pred_d titi) 4)", &mut pos, false).unwrap();
        assert_eq!(exp.name, "=");
        assert_eq!(exp.arguments.len(), 2);
        assert_eq!(exp.arguments[0].name, "pred_d");
        assert_eq!(exp.arguments[0].arguments[0].name, "titi");
        assert_eq!(exp.arguments[1].name, "4");
    }

    #[test]
    fn test_pddl_not() {
        let mut pos = 0;
        let exp = Expression::from_pddl("(not (pred_a toto))", &mut pos, false).unwrap();
        assert_eq!(exp.name, "not");
        assert_eq!(exp.arguments.len(), 1);
        assert_eq!(exp.arguments[0].name, "pred_a");
    }

    #[test]
    fn test_exists_parameter_declaration() {
        let mut pos = 0;
        let exp = Expression::from_str("exists(?l - location, at(pen)=?l)", &mut pos).unwrap();
        assert_eq!(exp.name, "exists");
        assert_eq!(exp.arguments.len(), 2);
        assert_eq!(exp.arguments[0].name, "?l");
        assert_eq!(exp.arguments[0].following.as_ref().unwrap().name, "location");
    }
}
