//! HTML snippets for assets and embeds: favicon links, style/script tag
//! lists, video iframes, image path prefixing and the OpenGraph meta block.

use crate::config::ProjectConfig;
use crate::token::Vars;
use maud::{Markup, html};
use std::path::Path;

/// `<link rel="icon">` for a favicon path, or `None` for unsupported formats.
pub fn favicon_tag(path: &str) -> Option<Markup> {
    let kind = match Path::new(path).extension()?.to_str()? {
        "ico" => "image/x-icon",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(html! { link rel="icon" type=(kind) href=(path); })
}

/// Prefix a relative image path with the project's image prefix.
///
/// External URLs and paths that already carry the prefix are left alone.
pub fn prefix_image(path: &str, prefix: &str) -> String {
    if path.starts_with("http") || path.starts_with(prefix) {
        path.to_string()
    } else {
        format!("{prefix}{path}")
    }
}

/// Render a list of style sheets. An entry named `default` expands to
/// `inherited`; an empty list yields `inherited` unchanged.
pub fn render_styles(list: &[String], inherited: Markup) -> Markup {
    render_stackable(list, inherited, |href| {
        html! { link rel="stylesheet" type="text/css" href=(href); }
    })
}

/// Script counterpart of [`render_styles`].
pub fn render_scripts(list: &[String], inherited: Markup) -> Markup {
    render_stackable(list, inherited, |src| {
        html! { script type="text/javascript" src=(src) defer {} }
    })
}

fn render_stackable(list: &[String], inherited: Markup, tag: impl Fn(&str) -> Markup) -> Markup {
    if list.is_empty() {
        return inherited;
    }
    html! {
        @for item in list {
            @if item == "default" {
                (inherited)
            } @else {
                (tag(item))
            }
        }
    }
}

// ============================================================================
// Video embeds
// ============================================================================

/// Render a `@` media reference: `<viewcode> [W:H] [options...]`.
///
/// View codes containing a letter are YouTube IDs, purely numeric ones are
/// Vimeo IDs. Returns `Err` with a message when the ratio is malformed.
pub fn video_embed(spec: &str) -> Result<String, String> {
    let mut args = spec.split_whitespace();
    let Some(viewcode) = args.next() else {
        return Ok(String::new());
    };
    let mut options: Vec<&str> = args.collect();

    let mut ratio = None;
    if let Some(first) = options.first()
        && first.contains(':')
    {
        ratio = Some(aspect_ratio_style(first)?);
        options.remove(0);
    }

    if viewcode.chars().any(char::is_alphabetic) {
        Ok(youtube(viewcode, ratio.as_deref(), &options))
    } else {
        Ok(vimeo(viewcode, ratio.as_deref(), &options))
    }
}

fn aspect_ratio_style(ratio: &str) -> Result<String, String> {
    let (x, y) = ratio
        .split_once(':')
        .ok_or_else(|| format!("bad aspect ratio {ratio:?}"))?;
    let x: f32 = x.parse().map_err(|_| format!("bad aspect ratio {ratio:?}"))?;
    let y: f32 = y.parse().map_err(|_| format!("bad aspect ratio {ratio:?}"))?;
    if x == 0.0 {
        return Err(format!("bad aspect ratio {ratio:?}"));
    }
    Ok(format!("padding-top: {:.2}%", y / x * 100.0))
}

fn youtube(viewcode: &str, ratio: Option<&str>, options: &[&str]) -> String {
    let controls = if options.contains(&"hide_controls") { 0 } else { 1 };
    let src = format!("https://www.youtube-nocookie.com/embed/{viewcode}?rel=0&controls={controls}");
    embed(&src, ratio, "accelerometer; encrypted-media; gyroscope; picture-in-picture")
}

fn vimeo(viewcode: &str, ratio: Option<&str>, options: &[&str]) -> String {
    let mut query = "color=0&title=0&byline=0&portrait=0".to_string();
    for option in options {
        if let Some(color) = option.strip_prefix('#') {
            query = query.replacen("color=0", &format!("color={color}"), 1);
            continue;
        }
        match *option {
            "hide_all" => query = query.replacen("&title=0&byline=0&portrait=0", "", 1),
            "hide_title" => query = query.replacen("&title=0", "", 1),
            "hide_portrait" => query = query.replacen("&portrait=0", "", 1),
            "hide_byline" => query = query.replacen("&byline=0", "", 1),
            _ => {}
        }
    }
    let src = format!("https://player.vimeo.com/video/{viewcode}?{query}");
    embed(&src, ratio, "fullscreen")
}

fn embed(src: &str, ratio: Option<&str>, allow: &str) -> String {
    html! {
        div.video {
            div.video-container style=[ratio] {
                iframe src=(src) frameborder="0" allow=(allow) allowfullscreen {}
            }
        }
    }
    .into_string()
}

// ============================================================================
// Meta block
// ============================================================================

/// Build the OpenGraph/twitter `<meta>` block for a document.
///
/// The document's own `meta.*` values win; `title` falls back to the
/// document title, `description` and `image` to the project defaults.
pub fn meta_block(meta: &Vars, title: &str, url_path: &str, config: &ProjectConfig) -> Markup {
    let mut tags = meta.clone();
    if !tags.contains_key("title") && !title.is_empty() {
        tags.insert("title".into(), title.to_string());
    }
    for key in ["description", "image"] {
        if !tags.contains_key(key)
            && let Some(value) = config.meta.get(key)
        {
            tags.insert(key.to_string(), value.clone());
        }
    }

    let domain = with_trailing_slash(&config.domain);
    let absolute = |value: &str| -> String {
        if value.starts_with("http") {
            value.to_string()
        } else {
            format!("{domain}{}", value.strip_prefix('/').unwrap_or(value))
        }
    };
    let url = format!("{domain}{}", url_path.trim_start_matches('/'));

    html! {
        @for (tag, value) in &tags {
            @if tag == "description" {
                meta name="description" content=(value);
            }
            @let value = if tag == "image" { absolute(value) } else { value.clone() };
            meta property=(format!("og:{tag}")) content=(value);
        }
        meta property="og:url" content=(url);
        @if let Some(creator) = config.meta.get("twitter") {
            meta property="twitter:creator" content=(creator);
            meta property="twitter:card" content="summary_large_image";
        }
    }
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maud::PreEscaped;

    fn config() -> ProjectConfig {
        ProjectConfig {
            domain: "https://a.org".into(),
            ..ProjectConfig::default()
        }
    }

    #[test]
    fn favicon_by_extension() {
        assert_eq!(
            favicon_tag("/f.png").unwrap().into_string(),
            "<link rel=\"icon\" type=\"image/png\" href=\"/f.png\">"
        );
        assert!(favicon_tag("/f.ico").unwrap().into_string().contains("image/x-icon"));
        assert!(favicon_tag("/f.svg").is_none());
        assert!(favicon_tag("noext").is_none());
    }

    #[test]
    fn image_prefix_rules() {
        assert_eq!(prefix_image("cat.png", "/img/"), "/img/cat.png");
        assert_eq!(prefix_image("/img/cat.png", "/img/"), "/img/cat.png");
        assert_eq!(prefix_image("https://x.org/c.png", "/img/"), "https://x.org/c.png");
        assert_eq!(prefix_image("cat.png", ""), "cat.png");
    }

    #[test]
    fn stackable_default_expands_inherited() {
        let list = vec!["default".to_string(), "/extra.css".to_string()];
        let out = render_styles(&list, PreEscaped("<base/>".into())).into_string();
        assert!(out.starts_with("<base/>"));
        assert!(out.contains("<link rel=\"stylesheet\" type=\"text/css\" href=\"/extra.css\">"));
    }

    #[test]
    fn stackable_empty_list_inherits() {
        assert_eq!(render_scripts(&[], PreEscaped("<s/>".into())).into_string(), "<s/>");
    }

    #[test]
    fn stackable_paths_are_escaped() {
        let list = vec!["/a.js?x=1&y=\"2\"".to_string()];
        let out = render_scripts(&list, html! {}).into_string();
        assert_eq!(
            out,
            "<script type=\"text/javascript\" src=\"/a.js?x=1&amp;y=&quot;2&quot;\" defer></script>"
        );
    }

    #[test]
    fn youtube_and_vimeo_detection() {
        assert!(video_embed("dQw4w9WgXcQ").unwrap().contains("youtube-nocookie.com/embed/dQw4w9WgXcQ"));
        assert!(video_embed("123456").unwrap().contains("player.vimeo.com/video/123456"));
    }

    #[test]
    fn video_ratio_and_options() {
        let html = video_embed("123456 16:9 hide_title #ff0000").unwrap();
        assert!(html.contains("padding-top: 56.25%"));
        assert!(html.contains("color=ff0000"));
        assert!(!html.contains("title=0"));

        let yt = video_embed("abc hide_controls").unwrap();
        assert!(yt.contains("controls=0"));
    }

    #[test]
    fn video_bad_ratio_is_error() {
        assert!(video_embed("abc x:9").is_err());
        assert!(video_embed("abc 0:9").is_err());
    }

    #[test]
    fn meta_block_fallbacks() {
        let mut cfg = config();
        cfg.meta.insert("description".into(), "site default".into());
        cfg.meta.insert("image".into(), "/card.png".into());
        cfg.meta.insert("twitter".into(), "@me".into());

        let html = meta_block(&Vars::new(), "Post", "/blog/post", &cfg).into_string();
        assert!(html.contains("<meta property=\"og:title\" content=\"Post\">"));
        assert!(html.contains("<meta name=\"description\" content=\"site default\">"));
        assert!(html.contains("og:image\" content=\"https://a.org/card.png\""));
        assert!(html.contains("og:url\" content=\"https://a.org/blog/post\""));
        assert!(html.contains("twitter:creator\" content=\"@me\""));
    }

    #[test]
    fn meta_block_document_values_win() {
        let mut meta = Vars::new();
        meta.insert("title".into(), "Custom".into());
        let html = meta_block(&meta, "Post", "", &config()).into_string();
        assert!(html.contains("og:title\" content=\"Custom\""));
        assert!(!html.contains("twitter:card"));
    }

    #[test]
    fn meta_values_are_attribute_escaped() {
        let mut meta = Vars::new();
        meta.insert("description".into(), "a & b".into());
        let html = meta_block(&meta, "Say \"hi\" <now>", "", &config()).into_string();
        assert!(html.contains("<meta property=\"og:title\" content=\"Say &quot;hi&quot; &lt;now&gt;\">"));
        assert!(html.contains("<meta name=\"description\" content=\"a &amp; b\">"));
    }
}
