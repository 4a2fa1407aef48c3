//! # kibitz-network
//!
//! 외부 AI 비전 API 어댑터.
//! 캡처 이미지를 OpenAI 호환 또는 Anthropic 형식으로 전송하고
//! 해설 텍스트를 받아온다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use kibitz_network::ai_vision_client::RemoteVisionAnalyzer;
//!
//! let analyzer = RemoteVisionAnalyzer::new(&config.vision_api)?;
//! let text = analyzer.analyze(&image, prompt).await?;
//! ```

pub mod ai_vision_client;
