//! `at/<time>`: parses its child name as a timestamp and lazily hands back a `RootsDir`
//! scoped to that instant. Everything reachable below an `at` root is read-only (spec
//! property 7 "at-root immutability"): `RootsDir::new` receives `Some(as_of)`, which is
//! what makes every mutation capability below it return `PermissionDenied`.

use crate::context::Context;
use crate::errors::FuseResult;
use crate::time_parse::parse_at_time;

use super::attr::NodeAttr;
use super::roots_dir::RootsDir;
use super::Node;

#[derive(Debug, Default)]
pub struct AtDir;

impl AtDir {
    pub fn attr(&self) -> NodeAttr {
        NodeAttr::read_only_dir()
    }

    /// `at` has no fixed children to list; every valid timestamp string is a valid lookup.
    pub fn readdir(&self) -> Vec<super::attr::DirEntry> {
        Vec::new()
    }

    pub fn lookup(&self, _ctx: &Context, name: &str) -> FuseResult<(Node, NodeAttr)> {
        let as_of = parse_at_time(name)?;
        Ok((
            Node::Roots(RootsDir::new(Some(as_of))),
            NodeAttr::read_only_dir(),
        ))
    }
}
