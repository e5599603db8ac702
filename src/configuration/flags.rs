use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use anyhow::Result;

struct Flag {
    desc: &'static str,
    is_boolean: bool,
    default_text: String,
    setter: Box<dyn Fn(&str) -> Result<()>>,
}

pub struct FlagValue<T> {
    r: Rc<RefCell<T>>,
}

impl<T: Clone> FlagValue<T> {
    fn new(r: Rc<RefCell<T>>) -> Self {
        Self { r }
    }

    pub fn get(&self) -> T {
        self.r.borrow().clone()
    }
}

/// A small single-dash flag set: flags are given as `-name value`,
/// `-name=value`, or bare `-name` for booleans.
pub struct FlagSet {
    flags: HashMap<&'static str, Flag>,
    order: Vec<&'static str>,
}

impl FlagSet {
    pub fn new() -> Self {
        FlagSet {
            flags: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn parse_args(&self, mut args: impl Iterator<Item = String>) -> Result<()> {
        let mut parsed_flags = HashSet::new();

        while let Some(arg) = args.next() {
            let arg = arg
                .as_str()
                .strip_prefix("--")
                .or_else(|| arg.strip_prefix('-'))
                .ok_or_else(|| anyhow::anyhow!("Expected an option, but got {:?}", arg))?;

            let (name, maybe_value) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (arg, None),
            };

            anyhow::ensure!(
                parsed_flags.insert(name.to_owned()),
                "The flag {} was provided twice",
                name,
            );

            let flag = self
                .flags
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown flag: {}", name))?;

            let value = match maybe_value {
                Some(value) => value.to_owned(),
                None if flag.is_boolean => "true".to_owned(),
                None => args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Value is missing for flag {}", name))?,
            };

            (flag.setter)(value.as_ref())?;
        }

        Ok(())
    }

    pub fn usage(&self) -> String {
        let mut out = String::from("Options:\n");
        for name in &self.order {
            let flag = &self.flags[name];
            out.push_str(&format!(
                "  -{} (default: {})\n        {}\n",
                name, flag.default_text, flag.desc
            ));
        }
        out
    }

    pub fn bool_var(
        &mut self,
        name: &'static str,
        default: bool,
        desc: &'static str,
    ) -> FlagValue<bool> {
        self.add_flag(name, true, default, desc, |s| match s {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(anyhow::anyhow!("Invalid value for bool flag: {}", s)),
        })
    }

    pub fn u64_var(
        &mut self,
        name: &'static str,
        default: u64,
        desc: &'static str,
    ) -> FlagValue<u64> {
        self.add_flag(name, false, default, desc, |s| Ok(s.parse()?))
    }

    fn add_flag<T: Clone + std::fmt::Display + 'static>(
        &mut self,
        name: &'static str,
        is_boolean: bool,
        default: T,
        desc: &'static str,
        parser: impl Fn(&str) -> Result<T> + 'static,
    ) -> FlagValue<T> {
        let default_text = default.to_string();
        let target = Rc::new(RefCell::new(default));
        let target_for_parser = target.clone();
        self.flags.insert(
            name,
            Flag {
                desc,
                is_boolean,
                default_text,
                setter: Box::new(move |s| {
                    target_for_parser.replace(parser(s)?);
                    Ok(())
                }),
            },
        );
        self.order.push(name);
        FlagValue::new(target)
    }
}
