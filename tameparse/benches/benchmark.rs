use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lazy_static::lazy_static;
use tameparse::compile::*;
use tameparse::diag::ConsoleSink;
use tameparse::lexer::LexerBuilder;
use tameparse::lr::{Associativity, BuilderOptions};
use tameparse::parser;

lazy_static! {
    static ref IDENTIFIER_SOUP: String = {
        let mut input = String::new();
        for index in 0..2000 {
            input.push_str("ident");
            input.push_str(&index.to_string());
            input.push(if index % 7 == 0 { '\n' } else { ' ' });
        }
        input
    };
}

fn tiny_language() -> LanguageDefinition {
    LanguageDefinition {
        name: "bench".to_string(),
        lexer_blocks: vec![
            LexerBlock {
                kind: LexerBlockKind::Symbols,
                definitions: vec![
                    LexemeDefinition::regex("id", "[a-zA-Z_][a-zA-Z0-9_]*"),
                    LexemeDefinition::regex("number", "[0-9]+(\\.[0-9]+)?"),
                    LexemeDefinition::literal("+", "+"),
                    LexemeDefinition::literal("*", "*"),
                    LexemeDefinition::literal("(", "("),
                    LexemeDefinition::literal(")", ")"),
                ],
            },
            LexerBlock {
                kind: LexerBlockKind::Ignore,
                definitions: vec![LexemeDefinition::regex("whitespace", "[ \\t\\n]+")],
            },
        ],
        grammar: GrammarBlock {
            definitions: vec![NonterminalDefinition {
                name: "expr".to_string(),
                productions: vec![
                    vec![
                        EbnfItem::Nonterminal("expr".to_string()),
                        EbnfItem::Terminal("+".to_string()),
                        EbnfItem::Nonterminal("expr".to_string()),
                    ],
                    vec![
                        EbnfItem::Nonterminal("expr".to_string()),
                        EbnfItem::Terminal("*".to_string()),
                        EbnfItem::Nonterminal("expr".to_string()),
                    ],
                    vec![
                        EbnfItem::Terminal("(".to_string()),
                        EbnfItem::Nonterminal("expr".to_string()),
                        EbnfItem::Terminal(")".to_string()),
                    ],
                    vec![EbnfItem::Terminal("id".to_string())],
                    vec![EbnfItem::Terminal("number".to_string())],
                ],
            }],
        },
        precedence: vec![
            PrecedenceLevel {
                associativity: Associativity::Left,
                terminals: vec!["+".to_string()],
            },
            PrecedenceLevel {
                associativity: Associativity::Left,
                terminals: vec!["*".to_string()],
            },
        ],
        parser: ParserBlock {
            start_symbols: vec!["expr".to_string()],
        },
    }
}

pub fn lexer_compile(c: &mut Criterion) {
    c.bench_function("lexer_compile", |b| {
        b.iter(|| {
            let mut builder = LexerBuilder::new();
            builder.add_pattern(parser::regex("[a-zA-Z_][a-zA-Z0-9_]*").unwrap(), 0);
            builder.add_pattern(parser::regex("[0-9]+(\\.[0-9]+)?").unwrap(), 1);
            builder.add_pattern(parser::regex("\"([^\"]|\\\\\")*\"").unwrap(), 2);
            builder.add_pattern(parser::regex("[ \\t\\n]+").unwrap(), 3);
            black_box(builder.compile().unwrap())
        })
    });
}

pub fn scanning(c: &mut Criterion) {
    let mut builder = LexerBuilder::new();
    builder.add_pattern(parser::regex("[a-zA-Z_][a-zA-Z0-9_]*").unwrap(), 0);
    builder.add_pattern(parser::regex("[0-9]+").unwrap(), 1);
    builder.add_pattern(parser::regex("[ \\t\\n]+").unwrap(), 2);
    let lexer = builder.compile().unwrap();

    c.bench_function("scan_identifiers", |b| {
        b.iter(|| black_box(lexer.scan(&IDENTIFIER_SOUP).count()))
    });
}

pub fn table_generation(c: &mut Criterion) {
    let definition = tiny_language();
    c.bench_function("compile_language", |b| {
        b.iter(|| {
            let mut sink = ConsoleSink::new();
            black_box(compile(
                black_box(&definition),
                &mut sink,
                &BuilderOptions::default(),
            ))
        })
    });
}

criterion_group!(benches, lexer_compile, scanning, table_generation);
criterion_main!(benches);
