//! System message registry, kept apart from the conversation log.

use threadloom_core::CoreMessage;

/// Untagged system messages plus named groups, each in registration order.
#[derive(Debug, Clone, Default)]
pub struct SystemRegistry {
    global: Vec<String>,
    tagged: Vec<(String, Vec<String>)>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system message. Returns `false` if the same content is
    /// already registered under that tag.
    pub fn add(&mut self, content: impl Into<String>, tag: Option<&str>) -> bool {
        let content = content.into();
        let bucket = match tag {
            None => &mut self.global,
            Some(tag) => match self.tagged.iter().position(|(t, _)| t == tag) {
                Some(index) => &mut self.tagged[index].1,
                None => {
                    self.tagged.push((tag.to_string(), Vec::new()));
                    let last = self.tagged.len() - 1;
                    &mut self.tagged[last].1
                }
            },
        };
        if bucket.contains(&content) {
            return false;
        }
        bucket.push(content);
        true
    }

    /// Messages for one tag (`None` = untagged).
    pub fn messages(&self, tag: Option<&str>) -> Vec<CoreMessage> {
        let bucket: &[String] = match tag {
            None => &self.global,
            Some(tag) => self
                .tagged
                .iter()
                .find(|(t, _)| t == tag)
                .map(|(_, bucket)| bucket.as_slice())
                .unwrap_or_default(),
        };
        bucket.iter().map(CoreMessage::system).collect()
    }

    /// Every system message: untagged first, then each tag in order.
    pub fn all(&self) -> Vec<CoreMessage> {
        self.global
            .iter()
            .chain(self.tagged.iter().flat_map(|(_, bucket)| bucket.iter()))
            .map(CoreMessage::system)
            .collect()
    }

    /// Drop the messages of one tag (`None` = untagged).
    pub fn clear(&mut self, tag: Option<&str>) {
        match tag {
            None => self.global.clear(),
            Some(tag) => self.tagged.retain(|(t, _)| t != tag),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.global.len() + self.tagged.iter().map(|(_, b)| b.len()).sum::<usize>()
    }
}
