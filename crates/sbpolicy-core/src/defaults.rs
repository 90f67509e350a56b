// ── Built-in policy documents ──
//
// Seeded on the first read when nothing has been persisted yet.

use crate::model::{ClientPolicy, DomainGroup, DomainPolicy};

/// The stock domain groups shipped with a fresh install.
pub fn domain_policy() -> DomainPolicy {
    DomainPolicy::new(vec![
        DomainGroup::new("ip-check", "IP check", &["2ip.io"]),
        DomainGroup::new(
            "youtube",
            "YouTube / Google video",
            &["youtube.com", "googlevideo.com", "ytimg.com", "ggpht.com"],
        ),
        DomainGroup::new(
            "openai-chatgpt",
            "OpenAI / ChatGPT (app + assets + API + login)",
            &[
                "chatgpt.com",
                "openai.com",
                "api.openai.com",
                "platform.openai.com",
                "auth.openai.com",
                "id.openai.com",
                "oaistatic.com",
                "oaiusercontent.com",
                "auth0.com",
                "cdn.auth0.com",
                "arkoselabs.com",
                "funcaptcha.com",
                "hcaptcha.com",
                "accounts.google.com",
                "appleid.apple.com",
            ],
        ),
        DomainGroup::new(
            "meta",
            "Meta (Facebook / Messenger / WhatsApp / Instagram)",
            &[
                "facebook.com",
                "fbcdn.net",
                "messenger.com",
                "whatsapp.com",
                "meta.com",
                "instagram.com",
                "cdninstagram.com",
            ],
        ),
        DomainGroup::new(
            "discord",
            "Discord",
            &["discord.com", "discord.gg", "discordapp.com", "discordcdn.com"],
        ),
        DomainGroup::new(
            "twitter-x",
            "X / Twitter",
            &[
                "twitter.com",
                "x.com",
                "t.co",
                "twimg.com",
                "pbs.twimg.com",
                "abs.twimg.com",
                "video.twimg.com",
                "api.twitter.com",
                "api.x.com",
            ],
        ),
        DomainGroup::new(
            "tiktok",
            "TikTok",
            &["tiktok.com", "tiktokcdn.com", "tiktokv.com"],
        ),
        DomainGroup::new(
            "reddit",
            "Reddit",
            &["reddit.com", "redd.it", "redditmedia.com"],
        ),
        DomainGroup::new("medium", "Medium", &["medium.com"]),
        DomainGroup::new("roblox", "Roblox", &["roblox.com", "rbxcdn.com"]),
        DomainGroup::new("rutracker", "RuTracker", &["rutracker.org"]),
        DomainGroup::new("other", "Other", &["cluesbysam.com"]),
    ])
}

pub fn client_policy() -> ClientPolicy {
    ClientPolicy::default()
}
