use std::{io::Write, sync::Arc};

use similar::{ChangeTag, TextDiff};
use tabwriter::TabWriter;

use crate::server::handler::{Error, MismatchField};

pub(crate) fn fail_with(request_count: usize, errors: &[Arc<Error>]) -> ! {
    panic!("{}", render_report(request_count, errors))
}

pub(crate) fn render_report(request_count: usize, errors: &[Arc<Error>]) -> String {
    let mut output = format!(
        "{} of {} handled requests failed.\n\n",
        errors
            .iter()
            .filter(|e| !matches!(***e, Error::Connection(_)))
            .count(),
        request_count
    );

    for (idx, err) in errors.iter().enumerate() {
        match create_error_output(idx, err) {
            Ok(text) => output.push_str(&text),
            Err(write_err) => output.push_str(&format!("{}: {} ({})\n", idx + 1, err, write_err)),
        }
    }

    output
}

fn create_error_output(idx: usize, err: &Error) -> std::io::Result<String> {
    let mut tw = TabWriter::new(vec![]);

    match err {
        Error::Mismatch {
            index,
            field,
            expected,
            actual,
        } => {
            write_header(
                &mut tw,
                idx,
                &format!("{} Mismatch (request[{}])", title_case(&field.to_string()), index),
            )?;

            writeln!(tw, "Expected:\n\t{}", expected)?;
            match actual {
                Some(actual) => writeln!(tw, "\nReceived:\n\t{}", actual)?,
                None => writeln!(tw, "\nReceived:\n\tnothing, the request did not contain it")?,
            }

            if let (MismatchField::Body, Some(actual)) = (field, actual) {
                write_diff(&mut tw, expected, actual)?;
            }
        }
        other => {
            write_header(&mut tw, idx, "Failure")?;
            writeln!(tw, "{}", other)?;
        }
    }

    tw.flush()?;
    let bytes = tw
        .into_inner()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;

    Ok(String::from_utf8_lossy(&bytes).to_string())
}

fn write_header(tw: &mut TabWriter<Vec<u8>>, idx: usize, title: &str) -> std::io::Result<()> {
    writeln!(tw, "{}", &"-".repeat(60))?;
    writeln!(tw, "{} : {}", idx + 1, title)?;
    writeln!(tw, "{}", &"-".repeat(60))
}

fn write_diff(tw: &mut TabWriter<Vec<u8>>, expected: &str, actual: &str) -> std::io::Result<()> {
    writeln!(tw, "\nDiff:")?;

    for change in TextDiff::from_lines(expected, actual).iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Equal => " ",
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
        };
        write!(tw, "\t{} {}", sign, change.to_string_lossy())?;
        if change.missing_newline() {
            writeln!(tw)?;
        }
    }

    Ok(())
}

fn title_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;

    for c in s.chars() {
        if c.is_whitespace() {
            capitalize_next = true;
            result.push(c);
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}
