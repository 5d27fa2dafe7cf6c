//! Markdown rendering of a single message.
//!
//! Entry format:
//!
//! ```text
//! #### {author}-{time label}
//! {text}
//! {embed author}:
//! {embed title}
//! {embed description}
//! <{embed url}>
//! ![name](attachments/...)
//! [name](attachments/...)
//! ```

use crate::domain::{AppError, EmbedKind, Message, Result};

use super::attachment_store::AttachmentStore;

/// Glyph that replaces the configured special emoji token.
pub const CRYSTAL_BALL: &str = "🔮";

/// Renders messages and pulls their binary content into the attachment store.
pub struct MessageRenderer {
    store: AttachmentStore,
    special_emoji: String,
}

impl MessageRenderer {
    #[must_use]
    pub fn new(store: AttachmentStore, special_emoji: impl Into<String>) -> Self {
        Self {
            store,
            special_emoji: special_emoji.into(),
        }
    }

    /// Render `message` as one markdown block.
    ///
    /// `time_label` is chosen by the caller; attachment names are derived
    /// from it as `{time_label}-{n}` with `n` counting embed images and
    /// attachments together, starting at 1.
    ///
    /// # Errors
    /// Propagates attachment download errors, and rejects image embeds
    /// that carry no thumbnail.
    pub async fn render(
        &mut self,
        message: &Message,
        time_label: &str,
        markdown_dir: &str,
        attachment_subdir: &str,
    ) -> Result<String> {
        let mut lines = vec![format!(
            "#### {}-{time_label}",
            message.author.display_name
        )];
        let mut att_count = 1;

        if !message.content.is_empty() {
            lines.push(message.content.clone());
        }

        for embed in &message.embeds {
            match embed.kind {
                EmbedKind::Rich | EmbedKind::Link => {
                    if let Some(author) = &embed.author_name {
                        lines.push(format!("{author}:"));
                    }
                    lines.extend(embed.title.iter().cloned());
                    lines.extend(embed.description.iter().cloned());
                    if let Some(url) = &embed.url {
                        lines.push(format!("<{url}>"));
                    }
                    if let Some(image) = &embed.image_url {
                        let name = format!("{time_label}-{att_count}");
                        let link = self
                            .store
                            .store(image, &name, markdown_dir, attachment_subdir)
                            .await?;
                        lines.push(format!("!{link}"));
                        att_count += 1;
                    }
                }
                EmbedKind::Image => {
                    let thumbnail = embed.thumbnail_proxy_url.as_deref().ok_or_else(|| {
                        AppError::content_shape(format!(
                            "Image embed without thumbnail in message {}",
                            message.id
                        ))
                    })?;
                    let name = format!("{time_label}-{att_count}");
                    let link = self
                        .store
                        .store(thumbnail, &name, markdown_dir, attachment_subdir)
                        .await?;
                    lines.push(format!("!{link}"));
                    att_count += 1;
                }
                EmbedKind::Other => {}
            }
        }

        for attachment in &message.attachments {
            let name = format!("{time_label}-{att_count}");
            let link = self
                .store
                .store(&attachment.url, &name, markdown_dir, attachment_subdir)
                .await?;
            if attachment.is_image() {
                lines.push(format!("!{link}"));
            } else {
                lines.push(link);
            }
            att_count += 1;
        }

        let block = lines.join("\n");
        Ok(self.normalize_emoji(block))
    }

    /// Must run after everything else has been rendered.
    fn normalize_emoji(&self, block: String) -> String {
        if self.special_emoji.is_empty() {
            block
        } else {
            block.replace(&self.special_emoji, CRYSTAL_BALL)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::testing::{at, attachment, text_message, CountingDownloader, MessageExt};
    use crate::domain::Embed;
    use tempfile::{tempdir, TempDir};

    fn renderer(emoji: &str) -> (TempDir, Arc<CountingDownloader>, MessageRenderer) {
        let dir = tempdir().unwrap();
        let downloader = Arc::new(CountingDownloader::new());
        let store = AttachmentStore::new(dir.path(), 4096, downloader.clone());
        (dir, downloader, MessageRenderer::new(store, emoji))
    }

    #[tokio::test]
    async fn test_plain_text_message() {
        let (_dir, downloader, mut renderer) = renderer("");
        let msg = text_message("1", "nouvee", "good morning", at("2023-01-01T08:00:00+08:00"));

        let block = renderer
            .render(&msg, "230101-080000", "chat", "attachments")
            .await
            .unwrap();

        assert_eq!(block, "#### nouvee-230101-080000\ngood morning");
        assert_eq!(downloader.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_embeds_and_attachments_share_counter() {
        let (_dir, downloader, mut renderer) = renderer("");
        let rich = Embed {
            author_name: Some("Bulletin".into()),
            title: Some("Weekly".into()),
            description: Some("All hands".into()),
            url: Some("https://example.com/post".into()),
            image_url: Some("https://cdn/banner.png".into()),
            ..Embed::empty(EmbedKind::Rich)
        };
        let image = Embed {
            thumbnail_proxy_url: Some("https://proxy/thumb.webp?size=64".into()),
            ..Embed::empty(EmbedKind::Image)
        };
        let msg = text_message("2", "charys117", "", at("2023-01-01T08:00:00+08:00"))
            .with_embed(rich)
            .with_embed(image)
            .with_attachment(attachment("https://cdn/photo.jpg", Some("image/jpeg")))
            .with_attachment(attachment("https://cdn/notes.txt", Some("text/plain")));

        let block = renderer
            .render(&msg, "230101-080000", "chat", "attachments")
            .await
            .unwrap();

        let expected = [
            "#### charys117-230101-080000",
            "Bulletin:",
            "Weekly",
            "All hands",
            "<https://example.com/post>",
            "![230101-080000-1](attachments/230101-080000-1.png)",
            "![230101-080000-2](attachments/230101-080000-2.webp)",
            "![230101-080000-3](attachments/230101-080000-3.jpg)",
            "[230101-080000-4](attachments/230101-080000-4.txt)",
        ]
        .join("\n");
        assert_eq!(block, expected);
        assert_eq!(downloader.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_link_embed_without_image_downloads_nothing() {
        let (_dir, downloader, mut renderer) = renderer("");
        let link = Embed {
            title: Some("Article".into()),
            url: Some("https://news.example.com/a".into()),
            ..Embed::empty(EmbedKind::Link)
        };
        let video = Embed {
            title: Some("Clip".into()),
            ..Embed::empty(EmbedKind::Other)
        };
        let msg = text_message("3", "nouvee", "look", at("2023-01-01T08:00:00+08:00"))
            .with_embed(link)
            .with_embed(video);

        let block = renderer.render(&msg, "t", "", "attachments/x").await.unwrap();

        assert_eq!(block, "#### nouvee-t\nlook\nArticle\n<https://news.example.com/a>");
        assert_eq!(downloader.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_special_emoji_replaced() {
        let (_dir, _downloader, mut renderer) = renderer("<:fate:42>");
        let msg = text_message(
            "4",
            "<:fate:42> Cortana",
            "roll <:fate:42> again <:fate:42>",
            at("2023-01-01T08:00:00+08:00"),
        );

        let block = renderer.render(&msg, "t", "chat", "attachments").await.unwrap();

        assert_eq!(block, "#### 🔮 Cortana-t\nroll 🔮 again 🔮");
    }

    #[tokio::test]
    async fn test_image_embed_without_thumbnail_is_rejected() {
        let (_dir, _downloader, mut renderer) = renderer("");
        let msg = text_message("5", "nouvee", "", at("2023-01-01T08:00:00+08:00"))
            .with_embed(Embed::empty(EmbedKind::Image));

        let err = renderer
            .render(&msg, "t", "chat", "attachments")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ContentShape { .. }));
    }
}
