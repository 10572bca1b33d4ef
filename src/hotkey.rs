use futures_util::{SinkExt, Stream};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    Error as HotkeyError, GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};

/// Keeps the OS registration alive; dropping it unregisters the hotkey.
pub struct HotkeyRegistration {
    _manager: GlobalHotKeyManager,
    hotkey: HotKey,
}

impl HotkeyRegistration {
    pub fn id(&self) -> u32 {
        self.hotkey.id()
    }
}

fn parse_key(key: &str) -> Option<Code> {
    let code = match key {
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "space" => Code::Space,
        "enter" | "return" => Code::Enter,
        "tab" => Code::Tab,
        ";" | "semicolon" => Code::Semicolon,
        "/" | "slash" => Code::Slash,
        "." | "period" => Code::Period,
        "`" | "backquote" => Code::Backquote,
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        _ => return None,
    };
    Some(code)
}

/// Parses combos such as `ctrl+shift+a` or `cmd+space`.
pub fn parse_combo(combo: &str) -> Option<HotKey> {
    let mut mods = Modifiers::empty();
    let mut code = None;

    for token in combo.split('+').map(|t| t.trim().to_lowercase()) {
        match token.as_str() {
            "ctrl" | "control" => mods |= Modifiers::CONTROL,
            "shift" => mods |= Modifiers::SHIFT,
            "alt" | "option" | "opt" => mods |= Modifiers::ALT,
            "cmd" | "command" | "super" | "meta" | "win" => mods |= Modifiers::SUPER,
            key => {
                if code.is_some() {
                    return None;
                }
                code = Some(parse_key(key)?);
            }
        }
    }

    Some(HotKey::new((!mods.is_empty()).then_some(mods), code?))
}

/// Registers the activation hotkey with the OS.
pub fn register(combo: &str) -> anyhow::Result<HotkeyRegistration> {
    let hotkey = parse_combo(combo).ok_or_else(|| anyhow::anyhow!("Failed to parse hotkey: {}", combo))?;
    let manager = GlobalHotKeyManager::new()
        .map_err(|e| anyhow::anyhow!("Failed to create hotkey manager: {}", e))?;

    if let Err(e) = manager.register(hotkey) {
        return Err(match e {
            HotkeyError::AlreadyRegistered(_) => {
                anyhow::anyhow!("Hotkey '{}' is already registered by another application", combo)
            }
            other => anyhow::anyhow!("Failed to register hotkey '{}': {}", combo, other),
        });
    }

    tracing::info!("Registered activation hotkey {} (id {})", combo, hotkey.id());
    Ok(HotkeyRegistration {
        _manager: manager,
        hotkey,
    })
}

/// Yields once per hotkey press.
pub fn activations() -> impl Stream<Item = ()> {
    iced::stream::channel(8, |mut output| async move {
        loop {
            let received = tokio::task::spawn_blocking(|| GlobalHotKeyEvent::receiver().recv()).await;
            match received {
                Ok(Ok(event)) if event.state == HotKeyState::Pressed => {
                    tracing::debug!("Hotkey {} pressed", event.id);
                    let _ = output.send(()).await;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Hotkey event channel closed: {}", e);
                    std::future::pending::<()>().await;
                }
                Err(e) => {
                    tracing::warn!("Hotkey listener failed: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_combo() {
        let parsed = parse_combo("ctrl+shift+a").unwrap();
        let expected = HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyA);
        assert_eq!(parsed.id(), expected.id());
    }

    #[test]
    fn test_parse_is_case_and_space_insensitive() {
        let parsed = parse_combo(" Cmd + Space ").unwrap();
        assert_eq!(parsed.id(), HotKey::new(Some(Modifiers::SUPER), Code::Space).id());
    }

    #[test]
    fn test_parse_rejects_bad_combos() {
        assert!(parse_combo("ctrl+shift").is_none());
        assert!(parse_combo("ctrl+a+b").is_none());
        assert!(parse_combo("ctrl+unknownkey").is_none());
        assert!(parse_combo("").is_none());
    }

    #[test]
    fn test_key_without_modifiers() {
        let parsed = parse_combo("f9").unwrap();
        assert_eq!(parsed.id(), HotKey::new(None, Code::F9).id());
    }
}
