use rustyline::error::ReadlineError;

pub struct LineReader {
    rl: rustyline::Editor<()>,
    history_file: String,
    prompt: String,
    continuation_prompt: String,
}

impl Drop for LineReader {
    fn drop(&mut self) {
        self.rl.save_history(&self.history_file).ok();
    }
}

pub enum LineReadStatus {
    Line(String),
    /// Ctrl-C at the prompt: drop whatever is pending and start over.
    Cancelled,
    Done,
}

impl LineReader {
    pub fn new(history_file: &str, prompt: &str, continuation_prompt: &str) -> LineReader {
        let mut rl = rustyline::Editor::<()>::new();
        rl.load_history(history_file).ok();
        LineReader {
            rl,
            history_file: history_file.into(),
            prompt: prompt.into(),
            continuation_prompt: continuation_prompt.into(),
        }
    }

    pub fn readline(&mut self, continuing: bool) -> LineReadStatus {
        let prompt = if continuing {
            &self.continuation_prompt
        } else {
            &self.prompt
        };

        match self.rl.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.rl.add_history_entry(line.as_str());
                }
                LineReadStatus::Line(line)
            }
            Err(ReadlineError::Interrupted) => LineReadStatus::Cancelled,
            Err(_) => LineReadStatus::Done,
        }
    }
}
