//! Graph description text for chains.

use crate::markov::chain::MkChain;
use std::fmt::{self, Write};

/// Directed-graph rendering of a chain.
///
/// One edge per pair of states with a positive transition probability, in
/// row definition order.
///
/// # Example
///
/// ```rust
/// use behavior::markov::{to_graph_text, MkChain, Row};
/// use stillwater::validation::Validation;
///
/// let Validation::Success(chain) = MkChain::new(vec![
///     Row::new("a").to("b", 1.0),
///     Row::new("b"),
/// ]) else {
///     panic!("rows are valid");
/// };
///
/// assert_eq!(
///     to_graph_text(&chain),
///     "digraph markov_chain {\n    rankdir = LR;\n    size = \"8,5\";\n    node [shape = circle];\n    \"a\" -> \"b\" [label = \"1.0\"];\n}\n"
/// );
/// ```
pub struct Graph<'a>(pub &'a MkChain);

impl fmt::Display for Graph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph markov_chain {{")?;
        writeln!(f, "    rankdir = LR;")?;
        writeln!(f, "    size = \"8,5\";")?;
        writeln!(f, "    node [shape = circle];")?;
        for row in self.0.rows() {
            for (target, probability) in row.targets() {
                if *probability > 0.0 {
                    writeln!(
                        f,
                        "    {} -> {} [label = \"{:?}\"];",
                        Quoted(row.state().as_str()),
                        Quoted(target.as_str()),
                        probability
                    )?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

/// A double-quoted graph identifier with `"` and `\` escaped.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for ch in self.0.chars() {
            if matches!(ch, '"' | '\\') {
                f.write_char('\\')?;
            }
            f.write_char(ch)?;
        }
        f.write_char('"')
    }
}

/// Render `chain` as graph description text.
pub fn to_graph_text(chain: &MkChain) -> String {
    Graph(chain).to_string()
}

impl MkChain {
    /// Same as [`to_graph_text`].
    pub fn to_graph_text(&self) -> String {
        to_graph_text(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markov::chain::Row;
    use stillwater::validation::Validation;

    fn chain(rows: Vec<Row>) -> MkChain {
        match MkChain::new(rows) {
            Validation::Success(chain) => chain,
            Validation::Failure(_) => panic!("test chain must be valid"),
        }
    }

    #[test]
    fn renders_header_edges_and_footer() {
        let text = chain(vec![
            Row::new("a").to("a", 0.5).to("b", 0.5),
            Row::new("b").to("a", 1.0),
        ])
        .to_graph_text();

        let expected = "digraph markov_chain {\n\
                        \x20   rankdir = LR;\n\
                        \x20   size = \"8,5\";\n\
                        \x20   node [shape = circle];\n\
                        \x20   \"a\" -> \"a\" [label = \"0.5\"];\n\
                        \x20   \"a\" -> \"b\" [label = \"0.5\"];\n\
                        \x20   \"b\" -> \"a\" [label = \"1.0\"];\n\
                        }\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn skips_zero_probability_edges() {
        let text = chain(vec![
            Row::new("a").to("b", 0.0).to("a", 1.0),
            Row::new("b"),
        ])
        .to_graph_text();

        assert!(!text.contains("\"a\" -> \"b\""));
        assert!(text.contains("\"a\" -> \"a\" [label = \"1.0\"];"));
    }

    #[test]
    fn escapes_quotes_and_backslashes_in_names() {
        let text = chain(vec![
            Row::new("say \"hi\"").to("C:\\tmp", 1.0),
            Row::new("C:\\tmp"),
        ])
        .to_graph_text();

        assert!(text.contains(r#"    "say \"hi\"" -> "C:\\tmp" [label = "1.0"];"#));
    }

    #[test]
    fn absorbing_only_chain_has_no_edges() {
        let text = chain(vec![Row::new("x"), Row::new("y")]).to_graph_text();
        assert_eq!(text.lines().count(), 5);
        assert!(text.ends_with("}\n"));
    }
}
