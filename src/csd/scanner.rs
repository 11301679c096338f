//! Line-oriented scanner for .csd orchestra sources
//!
//! Extracts two independent kinds of declarations without parsing the
//! orchestra language itself:
//!
//! - UI control declarations (slider/button/checkbox/groupbox/form lines in
//!   the header section), each yielding a [`ChannelController`]
//! - audio-rate output channel names declared with the `chnset` opcode
//!
//! Both scans are pure functions over the source text and are best-effort:
//! a malformed declaration is skipped, never aborting the whole scan.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control tokens that mark a line as a control declaration
const CONTROL_KINDS: [&str; 5] = ["slider", "button", "checkbox", "groupbox", "form"];

/// A UI control declaration scanned from a csd header
///
/// `value` doubles as the default seeded into the engine's control channel
/// before the first audio block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelController {
    /// The control token as written, e.g. "slider1" or "checkbox"
    pub kind: String,
    /// Name of the engine control channel this control drives
    pub channel: String,
    /// Display text
    pub text: String,
    /// Caption text
    pub caption: String,
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

impl ChannelController {
    pub fn set_range(&mut self, min: f32, max: f32, value: f32) {
        self.min = min;
        self.max = max;
        self.value = value;
    }
}

/// Strict per-line scan failure
#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    InvalidNumber {
        field: &'static str,
        text: String,
        line: usize,
    },
    MissingRangeValues {
        found: usize,
        line: usize,
    },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::InvalidNumber { field, text, line } => {
                write!(f, "line {line}: invalid number '{text}' in {field}()")
            }
            ScanError::MissingRangeValues { found, line } => {
                write!(f, "line {line}: range() needs min,max,value but has {found} field(s)")
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Slice the text between `marker` and the next `)`
fn paren_field<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find(')')?;
    Some(&rest[..end])
}

/// Same, for fields written as quoted strings: surrounding quotes stripped
fn quoted_field<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    paren_field(line, marker).map(|s| s.trim().trim_matches('"'))
}

fn parse_number(text: &str, field: &'static str, line_no: usize) -> Result<f32, ScanError> {
    text.trim().parse::<f32>().map_err(|_| ScanError::InvalidNumber {
        field,
        text: text.trim().to_string(),
        line: line_no,
    })
}

/// Strictly parse one line as a control declaration.
///
/// Returns `Ok(None)` for lines that are not control declarations,
/// `Ok(Some(..))` for a recognized declaration, and `Err` when a recognized
/// declaration carries a numeric field that fails to parse. All sub-fields
/// are optional; an absent marker leaves the field at its default.
pub fn parse_control_line(
    line: &str,
    line_no: usize,
) -> Result<Option<ChannelController>, ScanError> {
    let Some(token) = line.split_whitespace().next() else {
        return Ok(None);
    };
    if !CONTROL_KINDS.iter().any(|kind| token.contains(kind)) {
        return Ok(None);
    }

    let mut controller = ChannelController {
        kind: token.to_string(),
        ..ChannelController::default()
    };

    if let Some(caption) = quoted_field(line, "caption(") {
        controller.caption = caption.to_string();
    }
    if let Some(text) = quoted_field(line, "text(") {
        controller.text = text.to_string();
    }
    if let Some(channel) = quoted_field(line, "channel(") {
        controller.channel = channel.to_string();
    }
    if let Some(range) = paren_field(line, "range(") {
        let fields: Vec<&str> = range.split(',').collect();
        if fields.len() < 3 {
            return Err(ScanError::MissingRangeValues {
                found: fields.len(),
                line: line_no,
            });
        }
        controller.set_range(
            parse_number(fields[0], "range", line_no)?,
            parse_number(fields[1], "range", line_no)?,
            parse_number(fields[2], "range", line_no)?,
        );
    }
    if let Some(value) = paren_field(line, "value(") {
        controller.value = if value.trim().is_empty() {
            0.0
        } else {
            parse_number(value, "value", line_no)?
        };
    }

    Ok(Some(controller))
}

/// Scan the control declaration block of a csd source.
///
/// Scanning stops at the first line containing a closing tag (`</`);
/// everything before it is treated as the declaration block. Declarations
/// with unparseable numeric fields are logged and skipped.
pub fn scan_controls(source: &str) -> Vec<ChannelController> {
    let mut controllers = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        if line.contains("</") {
            break;
        }
        match parse_control_line(line, idx + 1) {
            Ok(Some(controller)) => controllers.push(controller),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping control declaration: {}", e),
        }
    }

    controllers
}

/// Scan a csd source for audio-rate channels declared for output.
///
/// Matches `chnset` lines whose first argument is an audio-rate variable
/// (`a` or `ga` prefix); the second argument, unquoted, is the channel name.
/// Names are collected distinct, in first-seen order.
pub fn scan_audio_channels(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(';') {
            continue;
        }
        let Some(pos) = trimmed.find("chnset") else {
            continue;
        };

        let mut args = trimmed[pos + "chnset".len()..].split(',');
        let Some(var) = args.next() else { continue };
        let var = var.trim_start();
        if !var.starts_with('a') && !var.starts_with("ga") {
            continue;
        }
        let Some(name) = args.next() else { continue };
        let name = name.replace(['\\', '"'], "");
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_slider_declaration() {
        let line = r#"slider1 channel("freq") range(20,2000,440) caption("Frequency")"#;
        let controller = parse_control_line(line, 1).unwrap().unwrap();
        assert_eq!(controller.kind, "slider1");
        assert_eq!(controller.channel, "freq");
        assert_eq!(controller.caption, "Frequency");
        assert_eq!(controller.min, 20.0);
        assert_eq!(controller.max, 2000.0);
        assert_eq!(controller.value, 440.0);
    }

    #[test]
    fn fields_are_optional() {
        let controller = parse_control_line(r#"button channel("go")"#, 1)
            .unwrap()
            .unwrap();
        assert_eq!(controller.kind, "button");
        assert_eq!(controller.channel, "go");
        assert_eq!(controller.caption, "");
        assert_eq!(controller.min, 0.0);
        assert_eq!(controller.max, 0.0);
    }

    #[test]
    fn text_and_value_fields() {
        let controller =
            parse_control_line(r#"checkbox text("Enable Drive") value(1)"#, 1)
                .unwrap()
                .unwrap();
        assert_eq!(controller.text, "Enable Drive");
        assert_eq!(controller.value, 1.0);
    }

    #[test]
    fn empty_value_defaults_to_zero() {
        let controller = parse_control_line(r#"checkbox channel("on") value()"#, 1)
            .unwrap()
            .unwrap();
        assert_eq!(controller.value, 0.0);
    }

    #[test]
    fn non_control_lines_are_ignored() {
        assert_eq!(parse_control_line("instr 1", 1).unwrap(), None);
        assert_eq!(parse_control_line("", 1).unwrap(), None);
        assert_eq!(parse_control_line("   ", 1).unwrap(), None);
    }

    #[test]
    fn bad_range_number_names_the_line() {
        let err = parse_control_line(r#"slider1 range(20,oops,440)"#, 7).unwrap_err();
        assert_eq!(
            err,
            ScanError::InvalidNumber {
                field: "range",
                text: "oops".to_string(),
                line: 7,
            }
        );
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn short_range_is_an_error() {
        let err = parse_control_line(r#"slider1 range(20,2000)"#, 3).unwrap_err();
        assert_eq!(err, ScanError::MissingRangeValues { found: 2, line: 3 });
    }

    #[test]
    fn scan_stops_at_closing_tag() {
        let source = concat!(
            "form caption(\"Synth\")\n",
            "slider1 channel(\"freq\") range(20,2000,440)\n",
            "</Cabbage>\n",
            "slider2 channel(\"never\") range(0,1,0)\n",
        );
        let controllers = scan_controls(source);
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers[0].kind, "form");
        assert_eq!(controllers[1].channel, "freq");
    }

    #[test]
    fn scan_skips_malformed_declarations() {
        let source = concat!(
            "slider1 channel(\"a\") range(0,1,0.5)\n",
            "slider2 channel(\"b\") range(0,bad,1)\n",
            "slider3 channel(\"c\") range(0,10,5)\n",
        );
        let controllers = scan_controls(source);
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers[0].channel, "a");
        assert_eq!(controllers[1].channel, "c");
    }

    #[test]
    fn scan_is_idempotent() {
        let source = concat!(
            "form caption(\"x\")\n",
            "slider1 channel(\"freq\") range(20,2000,440)\n",
        );
        assert_eq!(scan_controls(source), scan_controls(source));
        let audio = "chnset asig, \"outL\"\n";
        assert_eq!(scan_audio_channels(audio), scan_audio_channels(audio));
    }

    #[test]
    fn audio_channel_from_indented_chnset() {
        let names = scan_audio_channels("    chnset asig, \"outL\"\n");
        assert_eq!(names, ["outL"]);
    }

    #[test]
    fn control_rate_variables_are_not_audio_channels() {
        assert!(scan_audio_channels("chnset ksig, \"outL\"\n").is_empty());
    }

    #[test]
    fn commented_chnset_is_skipped() {
        assert!(scan_audio_channels(";chnset asig,\"x\"\n").is_empty());
    }

    #[test]
    fn global_audio_variables_count() {
        let names = scan_audio_channels("chnset gasig, \"master\"\n");
        assert_eq!(names, ["master"]);
    }

    #[test]
    fn names_are_distinct_in_first_seen_order() {
        let source = concat!(
            "chnset asigL, \"outL\"\n",
            "chnset asigR, \"outR\"\n",
            "chnset asigL, \"outL\"\n",
        );
        assert_eq!(scan_audio_channels(source), ["outL", "outR"]);
    }

    #[test]
    fn chnset_without_name_is_skipped() {
        assert!(scan_audio_channels("chnset asig\n").is_empty());
    }
}
