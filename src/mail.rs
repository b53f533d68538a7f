// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 邮件消息
//!
//! 框架只负责组装消息并在发送前做基本校验，真正的投递交给实现了
//! [`MailTransport`] 的对象。

use std::{fs, path::Path};

use bytes::Bytes;
use log::debug;

use crate::{
    config::MailConfig,
    exception::{Exception, Result},
};

/// 随邮件发送的附件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content: Bytes,
}

impl Attachment {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mail {
    from: Option<String>,
    /// SMTP 信封发件人，设置后覆盖 `from`
    envelope_sender: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    reply_to: Option<String>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
    headers: Vec<(String, String)>,
    attachments: Vec<Attachment>,
}

impl Mail {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以配置中的默认发件人新建消息
    pub fn from_config(config: &MailConfig) -> Self {
        let mut mail = Self::new();
        if !config.from.is_empty() {
            mail.from = Some(config.from.clone());
        }
        mail
    }

    pub fn from(mut self, address: &str) -> Self {
        self.from = Some(address.to_string());
        self
    }

    pub fn sender(mut self, address: &str) -> Self {
        self.envelope_sender = Some(address.to_string());
        self
    }

    pub fn to(mut self, address: &str) -> Self {
        self.to.push(address.to_string());
        self
    }

    pub fn cc(mut self, address: &str) -> Self {
        self.cc.push(address.to_string());
        self
    }

    pub fn bcc(mut self, address: &str) -> Self {
        self.bcc.push(address.to_string());
        self
    }

    pub fn reply_to(mut self, address: &str) -> Self {
        self.reply_to = Some(address.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn text(mut self, body: &str) -> Self {
        self.text = Some(body.to_string());
        self
    }

    pub fn html(mut self, body: &str) -> Self {
        self.html = Some(body.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 读取文件作为附件，附件名取文件名部分。
    pub fn attach_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Exception::Mail(format!("invalid attachment path: {}", path.display())))?
            .to_string();
        let content = Bytes::from(fs::read(path)?);
        debug!("附件{}已读取（{}字节）", filename, content.len());
        self.attachments.push(Attachment { filename, content });
        Ok(self)
    }
}

impl Mail {
    pub fn from_address(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn envelope_sender(&self) -> Option<&str> {
        self.envelope_sender.as_deref()
    }

    /// 所有收件人（to、cc、bcc）
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
    }

    pub fn reply_address(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    pub fn subject_line(&self) -> &str {
        &self.subject
    }

    pub fn text_body(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn html_body(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// 发送前的校验：必须有发件人、至少一个收件人以及正文，地址须含 `@`。
    pub fn validate(&self) -> Result<()> {
        let sender = self
            .from
            .as_deref()
            .ok_or_else(|| Exception::Mail("the message has no sender".to_string()))?;
        if self.recipients().next().is_none() {
            return Err(Exception::Mail("the message has no recipients".to_string()));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(Exception::Mail("the message has no body".to_string()));
        }
        let extra = self.reply_to.as_deref().into_iter().chain(self.envelope_sender.as_deref());
        for address in std::iter::once(sender).chain(self.recipients()).chain(extra) {
            if !address.contains('@') {
                return Err(Exception::Mail(format!("invalid address: {}", address)));
            }
        }
        debug!("邮件校验通过：{}", self.subject);
        Ok(())
    }
}

/// 邮件投递通道
#[cfg_attr(test, mockall::automock)]
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &Mail) -> Result<()>;
}

/// 校验后交给投递通道
pub fn deliver(transport: &dyn MailTransport, mail: &Mail) -> Result<()> {
    mail.validate()?;
    transport.send(mail)
}
