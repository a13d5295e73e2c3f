//! Blank lines between cells, following the PEP8 conventions.
//!
//! Python scripts look best with two blank lines around top-level functions
//! and classes, and one elsewhere. Writers use this count by default, and
//! readers only record `lines_to_next_cell` when the text deviates from it,
//! so PEP8-formatted scripts carry no spacing metadata at all.

use crate::stringparser::StringParser;

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn starts_definition(line: &str) -> bool {
    line.starts_with("def ") || line.starts_with("async ") || line.starts_with("class ")
}

/// Is the first non-blank, non-comment line of the cell a function or a class?
#[must_use]
pub fn next_instruction_is_function_or_class(lines: &[String]) -> bool {
    let mut parser = StringParser::new(Some("python"));
    for (i, line) in lines.iter().enumerate() {
        if parser.is_quoted() {
            parser = parser.read_line(line);
            continue;
        }
        parser = parser.read_line(line);
        if is_blank(line) {
            if i > 0 && is_blank(&lines[i - 1]) {
                return false;
            }
            continue;
        }
        if starts_definition(line) {
            return true;
        }
        if line.starts_with('#') || line.starts_with('@') || line.starts_with(' ') || line.starts_with(')') {
            continue;
        }
        return false;
    }
    false
}

/// Does the cell end inside the body of a top-level function or class?
#[must_use]
pub fn cell_ends_with_function_or_class(lines: &[String]) -> bool {
    let mut non_quoted = Vec::with_capacity(lines.len());
    let mut parser = StringParser::new(Some("python"));
    for line in lines {
        if !parser.is_quoted() {
            non_quoted.push(line.as_str());
        }
        parser = parser.read_line(line);
    }

    non_quoted.reverse();
    for (i, line) in non_quoted.iter().enumerate() {
        if is_blank(line) {
            // two blank lines already separate the code from what follows
            if i > 0 && is_blank(non_quoted[i - 1]) {
                return false;
            }
            continue;
        }
        if line.starts_with('#') || line.starts_with(' ') || line.starts_with(')') {
            continue;
        }
        return starts_definition(line);
    }
    false
}

/// Is the last line of the cell a line of code?
#[must_use]
pub fn cell_ends_with_code(lines: &[String]) -> bool {
    match lines.last() {
        None => false,
        Some(last) => !is_blank(last) && !last.starts_with('#'),
    }
}

/// Is there any code in the cell (before two consecutive blank lines)?
#[must_use]
pub fn cell_has_code(lines: &[String]) -> bool {
    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped.starts_with('#') {
            continue;
        }
        if stripped.is_empty() {
            if i > 0 && is_blank(&lines[i - 1]) {
                return false;
            }
            continue;
        }
        return true;
    }
    false
}

/// How many blank lines make the junction of the two cells PEP8-compliant?
///
/// # Examples
///
/// ```rust
/// use nbtext::pep8::pep8_lines_between_cells;
///
/// let prev = vec!["import os".to_string()];
/// let next = vec!["def f(x):".to_string(), "    return x".to_string()];
/// assert_eq!(pep8_lines_between_cells(&prev, &next, ".py"), 2);
/// assert_eq!(pep8_lines_between_cells(&prev, &next, ".R"), 1);
/// assert_eq!(pep8_lines_between_cells(&[], &next, ".py"), 0);
/// ```
#[must_use]
pub fn pep8_lines_between_cells(prev_lines: &[String], next_lines: &[String], ext: &str) -> usize {
    if next_lines.is_empty() {
        return 1;
    }
    if prev_lines.is_empty() {
        return 0;
    }
    if ext != ".py" {
        return 1;
    }
    if cell_ends_with_function_or_class(prev_lines) {
        return if cell_has_code(next_lines) { 2 } else { 1 };
    }
    if cell_ends_with_code(prev_lines) && next_instruction_is_function_or_class(next_lines) {
        return 2;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(str::to_string).collect()
    }

    #[test]
    fn test_next_instruction_is_function_or_class() {
        assert!(next_instruction_is_function_or_class(&lines("@decorate\ndef f():\n    pass")));
        assert!(next_instruction_is_function_or_class(&lines("# comment\nclass A:\n    pass")));
        assert!(!next_instruction_is_function_or_class(&lines("x = 1\ndef f(): pass")));
        assert!(!next_instruction_is_function_or_class(&lines("\n\ndef f(): pass")));
    }

    #[test]
    fn test_cell_ends_with_function() {
        assert!(cell_ends_with_function_or_class(&lines("def f(x):\n    return x")));
        assert!(cell_ends_with_function_or_class(&lines("class A:\n    '''doc\nstring'''\n")));
        assert!(!cell_ends_with_function_or_class(&lines("def f(x):\n    return x\n\n\nx = 1")));
    }

    #[test]
    fn test_cell_has_code() {
        assert!(!cell_has_code(&lines("# only a comment")));
        assert!(cell_has_code(&lines("# comment\n1 + 1")));
        assert!(!cell_has_code(&lines("\n\n1 + 1")));
    }

    #[test]
    fn test_function_followed_by_comment_only() {
        let prev = lines("def f():\n    pass");
        assert_eq!(pep8_lines_between_cells(&prev, &lines("# markdown text"), ".py"), 1);
        assert_eq!(pep8_lines_between_cells(&prev, &lines("f()"), ".py"), 2);
    }
}
