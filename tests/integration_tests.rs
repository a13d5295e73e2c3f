use nbtext::chunk_options::rmd_options_to_metadata;
use nbtext::cell_metadata::{metadata_to_text, parse_key_equal_value};
use nbtext::{
    detect_format, from_str, metadata, reads, to_string, writes, Cell, CellType, Error, Format, FormatOptions,
    Imbalance, Notebook, Value,
};
use pretty_assertions::assert_eq;

fn fmt(text: &str) -> Format {
    text.parse().unwrap()
}

/// The notebook metadata that a text without header reads to, so that
/// writing it gives no header either.
fn no_header() -> Value {
    metadata!({"jupytext": {"notebook_metadata_filter": "-all", "cell_metadata_filter": "-all"}})
}

#[test]
fn test_light_markdown_and_code() {
    let text = "# This is a markdown cell\n\na = 1\n";
    let notebook = reads(text, &fmt("py:light")).unwrap();

    assert_eq!(notebook.cells.len(), 2);
    assert_eq!(notebook.cells[0].cell_type, CellType::Markdown);
    assert_eq!(notebook.cells[0].source, "This is a markdown cell");
    assert_eq!(notebook.cells[1].cell_type, CellType::Code);
    assert_eq!(notebook.cells[1].source, "a = 1");

    assert_eq!(writes(&notebook, &fmt("py:light")).unwrap(), text);
}

#[test]
fn test_percent_commented_magic_is_not_a_cell() {
    let text = "# %%\n# %%magic # this is a commented magic, not a cell\n\n7\n";
    let notebook = reads(text, &fmt("py:percent")).unwrap();

    assert_eq!(notebook.cells.len(), 1);
    assert_eq!(
        notebook.cells[0].source,
        "%%magic # this is a commented magic, not a cell\n\n7"
    );
    assert_eq!(writes(&notebook, &fmt("py:percent")).unwrap(), text);
}

#[test]
fn test_light_end_marker_escalation() {
    let notebook = Notebook::new(vec![Cell::code("# -\n\nx = 1")]).with_metadata(no_header());
    let text = writes(&notebook, &fmt("py:light")).unwrap();
    assert_eq!(text, "# + endofcell=\"--\"\n# -\n\nx = 1\n# --\n");

    let back = reads(&text, &fmt("py:light")).unwrap();
    assert_eq!(back.cells.len(), 1);
    assert_eq!(back.cells[0].source, "# -\n\nx = 1");
    assert!(back.cells[0].metadata.is_empty(), "the end marker is not cell metadata");
    assert_eq!(writes(&back, &fmt("py:light")).unwrap(), text);
}

#[test]
fn test_rmd_chunk_options() {
    let (language, metadata) = rmd_options_to_metadata("r plot_1, dpi=72, fig.path=\"fig_path/\"", false).unwrap();
    assert_eq!(language, "R");
    assert_eq!(
        Value::Object(metadata.clone()),
        metadata!({"name": "plot_1", "dpi": 72, "fig.path": "fig_path/"})
    );

    let options = nbtext::chunk_options::metadata_to_rmd_options(Some("R"), &metadata, false);
    let (_, back) = rmd_options_to_metadata(&options, false).unwrap();
    assert_eq!(back, metadata);
}

#[test]
fn test_rmd_chunk_in_document() {
    let text = "```{r plot_1, dpi=72, fig.path=\"fig_path/\"}\nplot(1)\n```\n";
    let notebook = reads(text, &fmt("Rmd")).unwrap();
    let cell = &notebook.cells[0];
    assert_eq!(cell.source, "plot(1)");
    assert_eq!(
        Value::Object(cell.metadata.clone()),
        metadata!({"name": "plot_1", "dpi": 72, "fig.path": "fig_path/"})
    );
    assert_eq!(writes(&notebook, &fmt("Rmd")).unwrap(), text);
}

#[test]
fn test_unbalanced_chunk_options_fail() {
    let err = rmd_options_to_metadata("r a={)", false).unwrap_err();
    assert!(matches!(
        err,
        Error::ChunkOptions {
            kind: Imbalance::ClosingParenthesis,
            ..
        }
    ));
    assert!(err.is_chunk_options());

    let document = reads("```{r a={)}\n1\n```\n", &fmt("Rmd"));
    assert!(matches!(document, Err(Error::ChunkOptions { .. })));
}

#[test]
fn test_equal_sign_inside_quoted_value() {
    let metadata = parse_key_equal_value("key=\"value=5\"");
    assert_eq!(Value::Object(metadata.clone()), metadata!({"key": "value=5"}));
    assert_eq!(metadata_to_text(Some(""), &metadata, false), "key=\"value=5\"");
}

#[test]
fn test_markdown_with_header() {
    let text = "---\njupyter:\n  kernelspec:\n    display_name: Python 3\n    language: python\n    name: python3\n---\n\n# Title\n\n```python\nx = 1\n```\n";
    let notebook = reads(text, &fmt("md")).unwrap();

    assert_eq!(
        notebook.metadata.get("kernelspec"),
        Some(&metadata!({"display_name": "Python 3", "language": "python", "name": "python3"}))
    );
    let sources: Vec<&str> = notebook.cells.iter().map(|cell| cell.source.as_str()).collect();
    assert_eq!(sources, vec!["# Title", "x = 1"]);
    assert_eq!(writes(&notebook, &fmt("md")).unwrap(), text);
}

#[test]
fn test_root_level_metadata_as_raw_cell() {
    let text = "---\ntitle: A report\n---\n\nSome text\n";
    let notebook = reads(text, &fmt("md")).unwrap();
    assert_eq!(notebook.cells[0].cell_type, CellType::Raw);
    assert_eq!(notebook.cells[0].source, "---\ntitle: A report\n---");
    assert_eq!(writes(&notebook, &fmt("md")).unwrap(), text);

    let lifted = Format::new(".md").with_options(FormatOptions::new().with_root_level_metadata_as_raw_cell(false));
    let notebook = reads(text, &lifted).unwrap();
    assert_eq!(notebook.cells.len(), 1);
    let root = notebook
        .jupytext_metadata()
        .and_then(|jupytext| jupytext.get("root_level_metadata"));
    assert_eq!(root, Some(&metadata!({"title": "A report"})));
}

#[test]
fn test_executable_and_encoding_are_kept() {
    let text = "#!/usr/bin/env python\n# -*- coding: utf-8 -*-\n# %%\nx = 1\n";
    let notebook = reads(text, &fmt("py:percent")).unwrap();
    let jupytext = notebook.jupytext_metadata().unwrap();
    assert_eq!(jupytext.get_str("executable"), Some("/usr/bin/env python"));
    assert_eq!(jupytext.get_str("encoding"), Some("# -*- coding: utf-8 -*-"));
    assert_eq!(writes(&notebook, &fmt("py:percent")).unwrap(), text);
}

#[test]
fn test_other_encodings_are_rejected() {
    let err = reads("# -*- coding: latin-1 -*-\nx = 1\n", &fmt("py:light")).unwrap_err();
    assert!(matches!(err, Error::Header(_)));
}

#[test]
fn test_percent_cell_metadata() {
    let notebook = Notebook::new(vec![
        Cell::code("x = 1").with_metadata(metadata!({"tags": ["parameters"]})),
    ]);
    let text = writes(&notebook, &fmt("py:percent")).unwrap();
    assert_eq!(text, "# %% tags=[\"parameters\"]\nx = 1\n");

    let back = reads(&text, &fmt("py:percent")).unwrap();
    assert_eq!(back.cells[0].metadata.get("tags"), Some(&metadata!(["parameters"])));
    assert_eq!(
        back.jupytext_metadata().and_then(|jupytext| jupytext.get_str("cell_metadata_filter")),
        Some("tags,-all")
    );
    assert_eq!(writes(&back, &fmt("py:percent")).unwrap(), text);
}

#[test]
fn test_cell_metadata_json() {
    let notebook = Notebook::new(vec![Cell::code("x = 1").with_metadata(metadata!({"key": "value"}))]);
    let json = Format::new(".py")
        .with_format_name("percent")
        .with_options(FormatOptions::new().with_cell_metadata_json(true));
    let text = writes(&notebook.clone().with_metadata(no_header()), &json).unwrap();
    assert_eq!(text, "# %% {\"key\": \"value\"}\nx = 1\n");

    let back = reads(&text, &fmt("py:percent")).unwrap();
    assert_eq!(back.cells[0].metadata, notebook.cells[0].metadata);
    assert_eq!(
        back.jupytext_metadata().and_then(|jupytext| jupytext.get("cell_metadata_json")),
        Some(&Value::Bool(true))
    );
}

#[test]
fn test_light_custom_cell_markers() {
    let markers = Format::new(".py")
        .with_format_name("light")
        .with_options(FormatOptions::new().with_cell_markers("{{{,}}}"));
    let notebook = Notebook::new(vec![Cell::code("a = 1\n\nb = 2")]).with_metadata(no_header());
    let text = writes(&notebook, &markers).unwrap();
    assert_eq!(text, "# {{{\na = 1\n\nb = 2\n# }}}\n");

    let detected = detect_format(&text, ".py");
    assert_eq!(detected.to_string(), "py:light");
    assert_eq!(detected.options.cell_markers.as_deref(), Some("{{{,}}}"));

    let back = reads(&text, &Format::new(".py")).unwrap();
    assert_eq!(back.cells.len(), 1);
    assert_eq!(back.cells[0].source, "a = 1\n\nb = 2");
}

#[test]
fn test_hydrogen_keeps_cell_magics() {
    let notebook = Notebook::new(vec![Cell::code("%%bash\nls"), Cell::code("%time f()")]);
    let text = to_string(&notebook, "py:hydrogen").unwrap();
    assert_eq!(text, "# %%\n%%bash\nls\n\n# %%\n%time f()\n");

    let back = from_str(&text, "py").unwrap();
    let sources: Vec<&str> = back.cells.iter().map(|cell| cell.source.as_str()).collect();
    assert_eq!(sources, vec!["%%bash\nls", "%time f()"]);
}

#[test]
fn test_markdown_raw_and_region_cells() {
    let notebook = Notebook::new(vec![
        Cell::raw("raw text"),
        Cell::markdown("A\n\n\nB"),
        Cell::code("1 + 1"),
    ]);
    let text = to_string(&notebook, "md").unwrap();
    assert_eq!(
        text,
        "<!-- #raw -->\nraw text\n<!-- #endraw -->\n\n<!-- #region -->\nA\n\n\nB\n<!-- #endregion -->\n\n```python\n1 + 1\n```\n"
    );

    let back = from_str(&text, "md").unwrap();
    let cells: Vec<(CellType, &str)> = back
        .cells
        .iter()
        .map(|cell| (cell.cell_type, cell.source.as_str()))
        .collect();
    assert_eq!(
        cells,
        vec![
            (CellType::Raw, "raw text"),
            (CellType::Markdown, "A\n\n\nB"),
            (CellType::Code, "1 + 1")
        ]
    );
}

#[test]
fn test_spin_script() {
    let notebook = Notebook::new(vec![
        Cell::markdown("# Title\n\nText"),
        Cell::code("x <- 1"),
    ]);
    let text = to_string(&notebook, "R:spin").unwrap();
    assert_eq!(text, "#' # Title\n#'\n#' Text\n\nx <- 1\n");

    let back = from_str(&text, "R").unwrap();
    let sources: Vec<&str> = back.cells.iter().map(|cell| cell.source.as_str()).collect();
    assert_eq!(sources, vec!["# Title\n\nText", "x <- 1"]);
}

#[test]
fn test_other_languages() {
    let notebook = Notebook::new(vec![Cell::markdown("Some text"), Cell::code("int x = 1;")]);
    let text = to_string(&notebook, "cpp:percent").unwrap();
    assert_eq!(text, "// %% [markdown]\n// Some text\n\n// %%\nint x = 1;\n");

    let text = to_string(&notebook, "jl:light").unwrap();
    assert_eq!(text, "# Some text\n\nint x = 1;\n");
}

#[test]
fn test_notebook_serializes_to_json() {
    let notebook = Notebook::new(vec![Cell::code("x = 1").with_metadata(metadata!({"tags": ["a"]}))]);
    let json = serde_json::to_value(&notebook).unwrap();
    assert_eq!(json["cells"][0]["source"], "x = 1");
    assert_eq!(json["cells"][0]["metadata"]["tags"][0], "a");
    assert_eq!(json["nbformat"], 4);

    let back: Notebook = serde_json::from_value(json).unwrap();
    assert_eq!(back, notebook);
}
