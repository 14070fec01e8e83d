use std::fs;
use std::io;

pub enum Source {
    Literal,
    File(String),
}

pub struct Input {
    pub source: Source,
    pub content: String,
}

impl Input {
    pub fn from_file(path: &str) -> io::Result<Input> {
        Ok(Input {
            source: Source::File(path.to_string()),
            content: fs::read_to_string(path)?,
        })
    }

    pub fn literal(content: String) -> Input {
        Input {
            source: Source::Literal,
            content,
        }
    }
}
