// crates/matecv-core/src/model/menu.rs

use crate::codec::{self, Codec, Reader, Record};
use crate::error::{FormatError, Result};

pub const MENU_MAGIC: &[u8] = b"\x0aCM3D2_MENU";

/// Menu file (`.menu`).
///
/// Layout:
/// MAGIC
/// version:i32
/// src_name:str item_name:str category:str info_text:str
/// body_size:i32      (byte length of the command block that follows)
/// commands: repeated { arg_count:u8, args:str[arg_count] } until arg_count == 0
///
/// `body_size` is not stored: it is always derived from `commands` on build.
#[derive(Clone, Debug, PartialEq)]
pub struct Menu {
    pub version: i32,
    pub src_name: String,
    pub item_name: String,
    pub category: String,
    pub info_text: String,
    pub commands: Vec<Command>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { args: args.into_iter().map(Into::into).collect() }
    }

    /// The zero-argument command terminating a menu body.
    pub fn sentinel() -> Self {
        Self::default()
    }

    pub fn is_sentinel(&self) -> bool {
        self.args.is_empty()
    }

    /// First argument (the action tag), if any.
    pub fn action(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl Codec for Command {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.take_u8()? as usize;
        let mut args = Vec::with_capacity(n);
        for _ in 0..n {
            args.push(String::decode(r)?);
        }
        Ok(Self { args })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let n = u8::try_from(self.args.len()).map_err(|_| FormatError::TooManyArguments(self.args.len()))?;
        out.push(n);
        for a in &self.args {
            a.encode(out)?;
        }
        Ok(())
    }
}

impl Record for Menu {
    const MAGIC: &'static [u8] = MENU_MAGIC;

    fn decode_body(r: &mut Reader<'_>) -> Result<Self> {
        let version = r.take_i32()?;
        let src_name = String::decode(r)?;
        let item_name = String::decode(r)?;
        let category = String::decode(r)?;
        let info_text = String::decode(r)?;
        // Stored body size is recomputed on build; only its presence matters here.
        let _body_size = r.take_i32()?;
        let commands = codec::repeat_until(r, Command::is_sentinel)?;
        Ok(Self { version, src_name, item_name, category, info_text, commands })
    }

    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let body = self.encode_commands()?;
        let body_size = i32::try_from(body.len()).map_err(|_| FormatError::BodyTooLarge(body.len()))?;

        self.version.encode(out)?;
        self.src_name.encode(out)?;
        self.item_name.encode(out)?;
        self.category.encode(out)?;
        self.info_text.encode(out)?;
        body_size.encode(out)?;
        out.extend_from_slice(&body);
        Ok(())
    }
}

impl Menu {
    pub const DEFAULT_VERSION: i32 = 2001;

    pub fn create(item_name: &str, category: &str, info_text: &str, src_name: &str) -> Self {
        Self {
            version: Self::DEFAULT_VERSION,
            src_name: src_name.to_string(),
            item_name: item_name.to_string(),
            category: category.to_string(),
            info_text: info_text.to_string(),
            commands: vec![Command::sentinel()],
        }
    }

    fn encode_commands(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(self.commands.len() * 32);
        codec::encode_terminated(&self.commands, Command::is_sentinel, "command", &mut body)?;
        Ok(body)
    }

    /// Serialized length of the command block, as written into the header.
    pub fn body_size(&self) -> Result<usize> {
        Ok(self.encode_commands()?.len())
    }

    /// Insert a command before the sentinel. Empty argument lists are ignored
    /// so the sentinel stays unique.
    pub fn add_command<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd = Command::new(args);
        if cmd.is_sentinel() {
            return;
        }
        let idx = codec::sentinel_index(&mut self.commands, Command::is_sentinel, Command::sentinel);
        self.commands.insert(idx, cmd);
    }
}
