use anyhow::Result;
use colored::Colorize;
use geoconv_core::Coordinate;
use std::io::{BufRead, Write};

/// Line-based terminal prompts
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Read one trimmed line; None at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask a yes/no question; anything but "y"/"yes" is no
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.output, "{} ", format!("{} (y/n):", question).cyan())?;
        self.output.flush()?;

        let answer = self.read_line()?.unwrap_or_default().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    /// Collect coordinates one per line until "done"
    ///
    /// Returns None if the user types "exit". Invalid lines are reported and
    /// discarded. End of input counts as "done".
    pub fn read_coordinates(&mut self) -> Result<Option<Vec<Coordinate>>> {
        writeln!(
            self.output,
            "\n{}",
            "Enter coordinates (latitude,longitude), one per line.".cyan()
        )?;
        writeln!(
            self.output,
            "{}",
            "Type 'done' when finished, 'exit' to cancel".yellow()
        )?;

        let mut coordinates = Vec::new();
        loop {
            write!(self.output, "▶ ")?;
            self.output.flush()?;

            let Some(entry) = self.read_line()? else {
                writeln!(self.output)?;
                return Ok(Some(coordinates));
            };

            match entry.to_lowercase().as_str() {
                "" => continue,
                "done" => return Ok(Some(coordinates)),
                "exit" => {
                    writeln!(self.output, "{}", "Canceling input...".yellow())?;
                    return Ok(None);
                }
                _ => {}
            }

            match entry.parse::<Coordinate>() {
                Ok(coordinate) => {
                    writeln!(self.output, "{}", format!("Added: {}", coordinate).green())?;
                    coordinates.push(coordinate);
                }
                Err(e) => {
                    writeln!(self.output, "{}", e.to_string().red())?;
                }
            }
        }
    }
}
