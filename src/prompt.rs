use anyhow::{bail, Result};
use perch_core::Condition;
use std::io::{BufRead, Write};

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("input closed while waiting for an answer");
    }
    Ok(line.trim().to_string())
}

pub fn bird_id<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String> {
    loop {
        let id = ask(input, output, "Enter the bird ID: ")?;
        if !id.is_empty() {
            return Ok(id);
        }
    }
}

/// Asks until the answer is A or B.
pub fn condition<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Condition> {
    loop {
        let answer = ask(input, output, "Enter experimental condition (A or B): ")?;
        match answer.parse() {
            Ok(c) => return Ok(c),
            Err(_) => writeln!(output, "Invalid input. Please enter either 'A' or 'B'")?,
        }
    }
}
