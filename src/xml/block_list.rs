//! Block blob block-list documents (`?comp=blocklist`), per spec GLOSSARY.

use serde::Deserialize;

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename = "BlockList")]
pub struct BlockList {
    #[serde(rename = "CommittedBlocks", default)]
    pub committed: CommittedBlocks,
    #[serde(rename = "UncommittedBlocks", default)]
    pub uncommitted: UncommittedBlocks,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct CommittedBlocks {
    #[serde(rename = "Block", default)]
    pub items: Vec<Block>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct UncommittedBlocks {
    #[serde(rename = "Block", default)]
    pub items: Vec<Block>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Block {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: u64,
}

pub fn parse_block_list(payload: &[u8]) -> Result<BlockList, crate::error::Error> {
    quick_xml::de::from_reader(payload).map_err(|e| crate::error::Error::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_committed_and_uncommitted_blocks() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<BlockList>
  <CommittedBlocks>
    <Block><Name>block-1</Name><Size>1024</Size></Block>
  </CommittedBlocks>
  <UncommittedBlocks>
    <Block><Name>block-2</Name><Size>512</Size></Block>
  </UncommittedBlocks>
</BlockList>"#;
        let parsed = parse_block_list(body).unwrap();
        assert_eq!(parsed.committed.items[0].name, "block-1");
        assert_eq!(parsed.committed.items[0].size, 1024);
        assert_eq!(parsed.uncommitted.items[0].size, 512);
    }
}
