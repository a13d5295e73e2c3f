//! Property-based tests: round trips over generated notebooks and metadata.
//!
//! Rich cells mix code, comments, magics, indented blocks, single blank
//! lines and cell metadata. Dialects that split code at blank lines or
//! cannot store cell metadata get plain cells instead.

use nbtext::cell_metadata::{is_active, metadata_to_text, parse_key_equal_value};
use nbtext::chunk_options::{metadata_to_rmd_options, rmd_options_to_metadata};
use nbtext::{from_str, to_string, Cell, CellType, Metadata, Notebook, Value};
use proptest::prelude::*;

const RICH_FORMATS: &[&str] = &["py:light", "py:percent", "py:hydrogen", "md", "Rmd"];

const PLAIN_FORMATS: &[&str] = &["R:percent", "jl:light", "R:spin", "py:sphinx"];

fn word() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["alpha", "beta", "gamma", "delta", "text", "notebook", "value"])
        .prop_map(str::to_string)
}

fn words() -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 1..5).prop_map(|words| words.join(" "))
}

fn assignment() -> impl Strategy<Value = String> {
    ("[a-z]{1,4}", 0..1000u32).prop_map(|(name, value)| format!("v_{} = {}", name, value))
}

/// A few lines of code without blank lines.
fn code_block() -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        assignment().prop_map(|line| vec![line]),
        words().prop_map(|text| vec![format!("# {}", text)]),
        prop::sample::select(vec!["%time v_a = 1", "%load_ext autoreload", "!echo hello"])
            .prop_map(|line| vec![line.to_string()]),
        ("[a-z]{1,4}", assignment())
            .prop_map(|(name, body)| vec![format!("for v_{} in range(3):", name), format!("    {}", body)]),
    ]
}

/// Paragraphs of code separated by single blank lines.
fn rich_code() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(code_block(), 1..3), 1..3).prop_map(|paragraphs| {
        paragraphs
            .into_iter()
            .map(|blocks| blocks.concat().join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    })
}

fn rich_markdown() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(words(), 1..3), 1..3).prop_map(|paragraphs| {
        paragraphs
            .into_iter()
            .map(|lines| lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    })
}

fn cell_metadata() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(prop::collection::vec(word(), 1..3)),
        proptest::option::of(0..100i64),
    )
        .prop_map(|(tags, number)| {
            let mut metadata = Metadata::new();
            if let Some(tags) = tags {
                metadata.insert(
                    "tags".to_string(),
                    Value::Array(tags.into_iter().map(Value::from).collect()),
                );
            }
            if let Some(number) = number {
                metadata.insert("k_number".to_string(), Value::from(number));
            }
            Value::Object(metadata)
        })
}

fn rich_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        (rich_code(), cell_metadata()).prop_map(|(source, metadata)| Cell::code(source).with_metadata(metadata)),
        (rich_markdown(), cell_metadata())
            .prop_map(|(source, metadata)| Cell::markdown(source).with_metadata(metadata)),
    ]
}

fn plain_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        prop::collection::vec(assignment(), 1..4).prop_map(|lines| Cell::code(lines.join("\n"))),
        prop::collection::vec(words(), 1..4).prop_map(|lines| Cell::markdown(lines.join("\n"))),
    ]
}

fn rich_notebook() -> impl Strategy<Value = Notebook> {
    prop::collection::vec(rich_cell(), 1..6).prop_map(Notebook::new)
}

fn plain_notebook() -> impl Strategy<Value = Notebook> {
    prop::collection::vec(plain_cell(), 1..6).prop_map(Notebook::new)
}

fn cells(notebook: &Notebook) -> Vec<(CellType, String, Metadata)> {
    notebook
        .cells
        .iter()
        .map(|cell| (cell.cell_type, cell.source.clone(), cell.metadata.clone()))
        .collect()
}

/// Sphinx-gallery scripts read back with a leading `%matplotlib inline` cell.
fn cells_read_back(notebook: &Notebook, fmt: &str) -> Vec<(CellType, String, Metadata)> {
    let mut cells = cells(notebook);
    if fmt.ends_with(":sphinx") && !cells.is_empty() {
        cells.remove(0);
    }
    cells
}

fn key() -> impl Strategy<Value = String> {
    "[a-z]{1,6}".prop_map(|name| format!("k_{}", name))
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        (0..100_000i64).prop_map(Value::from),
        "[a-zA-Z0-9]{1,8}".prop_map(Value::from),
    ]
}

fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::vec((key(), scalar()), 0..5).prop_map(|entries| entries.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_rich_cells_read_back(notebook in rich_notebook()) {
        for fmt in RICH_FORMATS {
            let text = to_string(&notebook, fmt).unwrap();
            let back = from_str(&text, fmt).unwrap();
            prop_assert_eq!(cells(&back), cells(&notebook), "{}:\n{}", fmt, text);
        }
    }

    #[test]
    fn prop_rich_write_is_idempotent(notebook in rich_notebook()) {
        for fmt in RICH_FORMATS {
            let text = to_string(&notebook, fmt).unwrap();
            let again = to_string(&from_str(&text, fmt).unwrap(), fmt).unwrap();
            prop_assert_eq!(&again, &text, "{}", fmt);
        }
    }

    #[test]
    fn prop_plain_cells_read_back(notebook in plain_notebook()) {
        for fmt in PLAIN_FORMATS {
            let text = to_string(&notebook, fmt).unwrap();
            let back = from_str(&text, fmt).unwrap();
            prop_assert_eq!(cells_read_back(&back, fmt), cells(&notebook), "{}:\n{}", fmt, text);
        }
    }

    #[test]
    fn prop_plain_write_is_idempotent(notebook in plain_notebook()) {
        for fmt in PLAIN_FORMATS {
            let text = to_string(&notebook, fmt).unwrap();
            let again = to_string(&from_str(&text, fmt).unwrap(), fmt).unwrap();
            prop_assert_eq!(&again, &text, "{}", fmt);
        }
    }

    #[test]
    fn prop_key_equal_value_round_trip(metadata in metadata()) {
        let text = metadata_to_text(Some(""), &metadata, false);
        prop_assert_eq!(parse_key_equal_value(&text), metadata);
    }

    #[test]
    fn prop_chunk_options_round_trip(metadata in metadata()) {
        let options = metadata_to_rmd_options(Some("R"), &metadata, false);
        let (language, back) = rmd_options_to_metadata(&options, false).unwrap();
        prop_assert_eq!(language, "R");
        prop_assert_eq!(back, metadata);
    }

    #[test]
    fn prop_is_active_is_total(
        active in proptest::option::of("[a-zA-Z.,-]{0,12}"),
        tags in prop::collection::vec("[a-z-]{0,12}", 0..3),
        frozen in proptest::option::of(any::<bool>()),
        ext in prop::sample::select(vec![".py", ".md", ".Rmd", ".ipynb", ".R"]),
    ) {
        let mut metadata = Metadata::new();
        if let Some(active) = active {
            metadata.insert("active".to_string(), Value::from(active));
        }
        metadata.insert(
            "tags".to_string(),
            Value::Array(tags.into_iter().map(Value::from).collect()),
        );
        if let Some(frozen) = frozen {
            let mut run_control = Metadata::new();
            run_control.insert("frozen".to_string(), Value::from(frozen));
            metadata.insert("run_control".to_string(), Value::Object(run_control));
        }
        let _ = is_active(ext, &metadata, true);
        let _ = is_active(ext, &metadata, false);
    }
}
