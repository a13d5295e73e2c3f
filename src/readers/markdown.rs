//! The Markdown and R Markdown readers.
//!
//! Code cells are fenced code blocks with a language: ```` ```python ```` in
//! Markdown, ```` ```{r name, echo=FALSE} ```` in R Markdown. Markdown cells
//! run until the next code cell, or until two consecutive blank lines.
//! `<!-- #region -->` ... `<!-- #endregion -->` delimit a markdown cell
//! explicitly, and `<!-- #raw -->` a raw cell.

use super::{is_blank, CellReader, ReaderState};
use crate::cell_metadata::{is_active, is_json_metadata, text_to_metadata};
use crate::chunk_options::rmd_options_to_metadata;
use crate::languages::JUPYTER_LANGUAGES;
use crate::magics::uncomment_magic;
use crate::stringparser::StringParser;
use crate::{CellType, Error, Format, Metadata, Result, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static START_CODE_MD: Lazy<Regex> = Lazy::new(|| {
    let mut languages: Vec<String> = Vec::new();
    for language in JUPYTER_LANGUAGES.iter() {
        for variant in [language.to_string(), language.to_uppercase()] {
            if !languages.contains(&variant) {
                languages.push(variant);
            }
        }
    }
    let languages: Vec<String> = languages.iter().map(|language| regex::escape(language)).collect();
    Regex::new(&format!(r"^```(`*)(\s*)({})($|\s.*$)", languages.join("|"))).unwrap()
});
static START_CODE_MD_1_1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(.*)").unwrap());
static START_CODE_RMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\{(.*)\}\s*$").unwrap());

static NON_JUPYTER_CODE_MD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```").unwrap());
static NON_JUPYTER_CODE_MD_1_1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\{").unwrap());
static NON_JUPYTER_CODE_RMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```([^\{]|\s*$)").unwrap());

static END_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\s*$").unwrap());
static START_REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<!--\s*#(region|markdown|md|raw)(.*)-->\s*$").unwrap());

/// Which fence syntax the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fences {
    /// ```` ```python ````, only for known languages.
    Markdown,
    /// Markdown 1.0 and 1.1: any fence without braces.
    Legacy,
    /// ```` ```{r options} ````.
    RMarkdown,
}

/// Reads Markdown and R Markdown documents.
#[derive(Debug, Clone)]
pub struct MarkdownReader {
    state: ReaderState,
    fences: Fences,
    split_at_heading: bool,
    in_region: bool,
    end_region_re: Option<Regex>,
    end_code_re: Regex,
}

impl MarkdownReader {
    /// A reader for `.md` documents.
    #[must_use]
    pub fn markdown(fmt: &Format, default_language: Option<&str>) -> Self {
        let legacy = matches!(fmt.options.format_version.as_deref(), Some("1.0") | Some("1.1"));
        Self::with_fences(
            fmt,
            default_language,
            if legacy { Fences::Legacy } else { Fences::Markdown },
            false,
        )
    }

    /// A reader for `.Rmd` documents.
    #[must_use]
    pub fn rmarkdown(fmt: &Format, default_language: Option<&str>) -> Self {
        Self::with_fences(fmt, default_language, Fences::RMarkdown, true)
    }

    fn with_fences(fmt: &Format, default_language: Option<&str>, fences: Fences, comment_magics: bool) -> Self {
        MarkdownReader {
            state: ReaderState::new(fmt, default_language, comment_magics),
            fences,
            split_at_heading: fmt.options.split_at_heading.unwrap_or(false),
            in_region: false,
            end_region_re: None,
            end_code_re: END_CODE.clone(),
        }
    }

    fn start_code_re(&self) -> &'static Regex {
        match self.fences {
            Fences::Markdown => &START_CODE_MD,
            Fences::Legacy => &START_CODE_MD_1_1,
            Fences::RMarkdown => &START_CODE_RMD,
        }
    }

    fn non_jupyter_code_re(&self) -> &'static Regex {
        match self.fences {
            Fences::Markdown => &NON_JUPYTER_CODE_MD,
            Fences::Legacy => &NON_JUPYTER_CODE_MD_1_1,
            Fences::RMarkdown => &NON_JUPYTER_CODE_RMD,
        }
    }

    /// Language and metadata of a fence; also sets the matching closing fence.
    fn options_to_metadata(&mut self, captures: &Captures<'_>) -> Result<(Option<String>, Metadata)> {
        let group = |i: usize| captures.get(i).map_or("", |m| m.as_str());
        let options = match self.fences {
            Fences::RMarkdown => {
                let (language, metadata) = rmd_options_to_metadata(group(1), self.state.use_runtools)?;
                return Ok((Some(language).filter(|l| !l.is_empty()), metadata));
            }
            Fences::Markdown => {
                self.end_code_re =
                    Regex::new(&format!("^```{}", regex::escape(group(1)))).map_err(Error::custom)?;
                [group(2), group(3), group(4)].join(" ")
            }
            Fences::Legacy => {
                self.end_code_re = END_CODE.clone();
                group(1).to_string()
            }
        };
        self.state.cell_metadata_json = self.state.cell_metadata_json || is_json_metadata(&options);
        let (language, metadata) = text_to_metadata(&options, false);
        Ok((Some(language).filter(|l| !l.is_empty()), metadata))
    }

    fn find_markdown_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)> {
        self.state.cell_type = CellType::Markdown;
        let mut prev_blank = 0;
        let mut in_explicit_code_block = false;
        let mut in_indented_code_block = false;

        for (i, line) in lines.iter().enumerate() {
            if in_explicit_code_block && self.end_code_re.is_match(line) {
                in_explicit_code_block = false;
                continue;
            }

            if prev_blank > 0 && line.starts_with("    ") && !is_blank(line) {
                in_indented_code_block = true;
                prev_blank = 0;
                continue;
            }
            if in_indented_code_block && !is_blank(line) && !line.starts_with("    ") {
                in_indented_code_block = false;
            }
            if in_indented_code_block || in_explicit_code_block {
                continue;
            }

            if START_REGION.is_match(line) {
                if i > 1 && prev_blank > 0 {
                    return Ok((i - 1, i, false));
                }
                return Ok((i, i, false));
            }

            if let Some(captures) = self.start_code_re().captures(line) {
                if line.starts_with("```{bibliography}") {
                    in_explicit_code_block = true;
                    prev_blank = 0;
                    continue;
                }
                // fences with a .noeval attribute stay in the text
                let (_, metadata) = self.options_to_metadata(&captures)?;
                if metadata.get(".noeval") == Some(&Value::Null) {
                    in_explicit_code_block = true;
                    prev_blank = 0;
                    continue;
                }
                if i > 1 && prev_blank > 0 {
                    return Ok((i - 1, i, false));
                }
                return Ok((i, i, false));
            }

            if self.non_jupyter_code_re().is_match(line) {
                if prev_blank >= 2 {
                    return Ok((i - 2, i, true));
                }
                in_explicit_code_block = true;
                prev_blank = 0;
                continue;
            }

            if self.split_at_heading && line.starts_with('#') && prev_blank >= 1 {
                return Ok((i - 1, i, false));
            }

            if is_blank(line) {
                prev_blank += 1;
            } else if prev_blank >= 2 {
                return Ok((i - 2, i, true));
            } else {
                prev_blank = 0;
            }
        }
        Ok((lines.len(), lines.len(), false))
    }
}

impl CellReader for MarkdownReader {
    fn state(&mut self) -> &mut ReaderState {
        &mut self.state
    }

    fn read_options(&mut self, line: &str) -> Result<()> {
        if let Some(captures) = START_REGION.captures(line) {
            self.in_region = true;
            let region_name = captures[1].to_string();
            let options = captures.get(2).map_or("", |m| m.as_str());
            self.end_region_re = Some(
                Regex::new(&format!(r"^<!--\s*#end{}\s*-->\s*$", region_name)).map_err(Error::custom)?,
            );
            self.state.cell_metadata_json = self.state.cell_metadata_json || is_json_metadata(options);
            let (title, mut metadata) = text_to_metadata(options, true);
            self.state.cell_type = if region_name == "raw" {
                CellType::Raw
            } else {
                CellType::Markdown
            };
            if !title.is_empty() {
                metadata.insert("title".to_string(), Value::from(title));
            }
            if region_name == "markdown" || region_name == "md" {
                metadata.insert("region_name".to_string(), Value::from(region_name));
            }
            self.state.metadata = Some(metadata);
        } else if let Some(captures) = self.start_code_re().captures(line) {
            let (language, metadata) = self.options_to_metadata(&captures)?;
            if metadata.get(".noeval") == Some(&Value::Null) {
                self.state.cell_type = CellType::Markdown;
                self.state.metadata = Some(Metadata::new());
                self.state.language = None;
            } else {
                self.state.language = language;
                self.state.metadata = Some(metadata);
            }
        }
        Ok(())
    }

    fn find_cell_end(&mut self, lines: &[String]) -> Result<(usize, usize, bool)> {
        if self.in_region {
            if let Some(end_region_re) = &self.end_region_re {
                if let Some(i) = lines.iter().position(|line| end_region_re.is_match(line)) {
                    return Ok((i, i + 1, true));
                }
            }
            return Ok((lines.len(), lines.len(), false));
        }
        if self.state.metadata.is_none() {
            return self.find_markdown_end(lines);
        }

        self.state.cell_type = CellType::Code;
        let mut parser = StringParser::new(Some(self.state.cell_language()));
        for (i, line) in lines.iter().enumerate().skip(1) {
            if parser.is_quoted() {
                parser = parser.read_line(line);
                continue;
            }
            parser = parser.read_line(line);
            if self.end_code_re.is_match(line) {
                return Ok((i, i + 1, true));
            }
        }
        Ok((lines.len(), lines.len(), false))
    }

    fn uncomment_code_and_magics(&mut self, lines: Vec<String>) -> Vec<String> {
        let state = &self.state;
        let uncomment = state.cell_type == CellType::Code
            && state.comment_magics
            && (self.fences != Fences::RMarkdown
                || state
                    .metadata
                    .as_ref()
                    .map_or(true, |metadata| is_active(&state.ext, metadata, true)));
        if uncomment {
            return uncomment_magic(&lines, state.cell_language(), true, true);
        }
        lines
    }
}
