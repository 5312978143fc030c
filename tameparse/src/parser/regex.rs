use crate::regex::{Regex, RegexTree};
use crate::symbols::SymbolSet;
use nom::branch::alt;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{anychar, char, one_of};
use nom::combinator::{map, map_opt, opt, value, verify};
use nom::multi::{many1, separated_list1};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

pub(crate) fn full_regex(input: &str) -> IResult<&str, Regex> {
    map(expression, |tree| Regex { tree })(input)
}

fn expression(input: &str) -> IResult<&str, RegexTree> {
    map(
        separated_list1(char('|'), sequence),
        wrap_multiple(RegexTree::Alt),
    )(input)
}

fn sequence(input: &str) -> IResult<&str, RegexTree> {
    map(many1(quantified), wrap_multiple(RegexTree::Sequence))(input)
}

fn wrap_multiple(f: impl Fn(Vec<RegexTree>) -> RegexTree) -> impl Fn(Vec<RegexTree>) -> RegexTree {
    move |mut items| {
        if items.len() > 1 {
            f(items)
        } else {
            items.remove(0)
        }
    }
}

fn quantified(input: &str) -> IResult<&str, RegexTree> {
    map(pair(atom, opt(one_of("?+*"))), apply_quantifier)(input)
}

fn apply_quantifier((tree, quantifier): (RegexTree, Option<char>)) -> RegexTree {
    match quantifier {
        Some('*') => RegexTree::Repeat(Box::new(tree)),
        // x+ is x followed by zero or more x
        Some('+') => RegexTree::Sequence(vec![tree.clone(), RegexTree::Repeat(Box::new(tree))]),
        Some('?') => RegexTree::Optional(Box::new(tree)),
        None => tree,
        _ => unreachable!("quantifier can only be ?, + or *"),
    }
}

fn atom(input: &str) -> IResult<&str, RegexTree> {
    alt((par_expr, char_class, dot, single_char))(input)
}

fn par_expr(input: &str) -> IResult<&str, RegexTree> {
    delimited(char('('), expression, char(')'))(input)
}

fn dot(input: &str) -> IResult<&str, RegexTree> {
    value(RegexTree::Class(SymbolSet::all()), char('.'))(input)
}

fn single_char(input: &str) -> IResult<&str, RegexTree> {
    map(alt((escaped_symbol, literal_symbol)), |symbol| {
        RegexTree::Class(SymbolSet::single(symbol))
    })(input)
}

fn literal_symbol(input: &str) -> IResult<&str, u32> {
    map(verify(anychar, |c| !is_reserved(*c)), |c| c as u32)(input)
}

fn is_reserved(c: char) -> bool {
    ['|', '*', '+', '?', '(', ')', '[', ']', '\\', '.'].contains(&c)
}

/// An escape sequence, after the backslash has been consumed elsewhere: a named control
/// character, a numeric codepoint, or any other character standing for itself
fn escaped_symbol(input: &str) -> IResult<&str, u32> {
    preceded(
        char('\\'),
        alt((
            value(0x0a, char('n')),
            value(0x0d, char('r')),
            value(0x09, char('t')),
            value(0x1b, char('e')),
            value(0x07, char('a')),
            value(0x0c, char('f')),
            preceded(char('x'), hex_codepoint(2)),
            preceded(char('u'), hex_codepoint(4)),
            preceded(char('o'), octal_codepoint(6, 6)),
            octal_codepoint(1, 3),
            map(anychar, |c| c as u32),
        )),
    )(input)
}

fn hex_codepoint(digits: usize) -> impl Fn(&str) -> IResult<&str, u32> {
    move |input| {
        map_opt(
            take_while_m_n(digits, digits, |c: char| c.is_ascii_hexdigit()),
            |s: &str| u32::from_str_radix(s, 16).ok(),
        )(input)
    }
}

fn octal_codepoint(min: usize, max: usize) -> impl Fn(&str) -> IResult<&str, u32> {
    move |input| {
        map_opt(
            take_while_m_n(min, max, |c: char| ('0'..='7').contains(&c)),
            |s: &str| u32::from_str_radix(s, 8).ok(),
        )(input)
    }
}

fn char_class(input: &str) -> IResult<&str, RegexTree> {
    map(
        delimited(char('['), pair(opt(char('^')), many1(class_item)), char(']')),
        |(negated, items)| {
            let mut set = SymbolSet::empty();
            for item in items {
                set = set.union(&item);
            }
            if negated.is_some() {
                set = set.complement();
            }
            RegexTree::Class(set)
        },
    )(input)
}

fn class_item(input: &str) -> IResult<&str, SymbolSet> {
    alt((class_range, map(class_char, SymbolSet::single)))(input)
}

fn class_range(input: &str) -> IResult<&str, SymbolSet> {
    map_opt(
        tuple((class_char, char('-'), class_char)),
        |(lo, _, hi)| (lo <= hi).then(|| SymbolSet::range(lo, hi + 1)),
    )(input)
}

fn class_char(input: &str) -> IResult<&str, u32> {
    alt((
        escaped_symbol,
        map(verify(anychar, |c| !matches!(c, ']' | '\\' | '-')), |c| {
            c as u32
        }),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolRange;

    fn parse(input: &str) -> RegexTree {
        crate::parser::regex(input).unwrap().tree
    }

    #[test]
    fn literal_sequence() {
        assert_eq!(
            parse("ab"),
            RegexTree::Sequence(vec![
                RegexTree::Class(SymbolSet::single(97)),
                RegexTree::Class(SymbolSet::single(98)),
            ])
        );
    }

    #[test]
    fn quantifiers_bind_to_the_preceding_atom() {
        assert_eq!(
            parse("ab*"),
            RegexTree::Sequence(vec![
                RegexTree::Class(SymbolSet::single(97)),
                RegexTree::Repeat(Box::new(RegexTree::Class(SymbolSet::single(98)))),
            ])
        );
        assert_eq!(
            parse("(ab)?"),
            RegexTree::Optional(Box::new(RegexTree::Sequence(vec![
                RegexTree::Class(SymbolSet::single(97)),
                RegexTree::Class(SymbolSet::single(98)),
            ])))
        );
    }

    #[test]
    fn plus_desugars_to_repeat() {
        let a = RegexTree::Class(SymbolSet::single(97));
        assert_eq!(
            parse("a+"),
            RegexTree::Sequence(vec![a.clone(), RegexTree::Repeat(Box::new(a))])
        );
    }

    #[test]
    fn classes_ranges_and_negation() {
        assert_eq!(
            parse("[a-cx]"),
            RegexTree::Class(SymbolSet::from_ranges([
                SymbolRange::new(97, 100),
                SymbolRange::new(120, 121),
            ]))
        );
        let RegexTree::Class(negated) = parse("[^a-z]") else {
            panic!("expected a class");
        };
        assert!(!negated.contains('q' as u32));
        assert!(negated.contains('A' as u32));
    }

    #[test]
    fn escapes() {
        assert_eq!(parse(r"\n"), RegexTree::Class(SymbolSet::single(0x0a)));
        assert_eq!(parse(r"\x41"), RegexTree::Class(SymbolSet::single(0x41)));
        assert_eq!(parse(r"✓"), RegexTree::Class(SymbolSet::single(0x2713)));
        assert_eq!(parse(r"\o000041"), RegexTree::Class(SymbolSet::single(0o41)));
        assert_eq!(parse(r"\101"), RegexTree::Class(SymbolSet::single(0o101)));
        assert_eq!(parse(r"\."), RegexTree::Class(SymbolSet::single('.' as u32)));
    }

    #[test]
    fn rejects_dangling_quantifier() {
        assert!(crate::parser::regex("*a").is_err());
        assert!(crate::parser::regex("a|").is_err());
        assert!(crate::parser::regex("(a").is_err());
    }
}
