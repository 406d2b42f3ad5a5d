//! Steam `EResult` codes as returned in the `x-eresult` response header.
//!
//! The table is kept sorted by code so lookups can binary-search it.

/// Every known `EResult` code and its description.
pub const ERESULTS: &[(u32, &str)] = &[
    (1, "All good! No error. (k_EResultOK)"),
    (2, "Generic failure. (k_EResultFail)"),
    (3, "No Steam connection. (k_EResultNoConnection)"),
    (5, "Invalid password or ticket. (k_EResultInvalidPassword)"),
    (6, "This user is logged in from another location. (k_EResultLoggedInElsewhere)"),
    (7, "Invalid protocol version. (k_EResultInvalidProtocolVer)"),
    (8, "Invalid parameter. (k_EResultInvalidParam)"),
    (9, "File not found. (k_EResultFileNotFound)"),
    (10, "Called method is busy, no action taken. (k_EResultBusy)"),
    (11, "Invalid state. (k_EResultInvalidState)"),
    (12, "Invalid name. (k_EResultInvalidName)"),
    (13, "Invalid email address. (k_EResultInvalidEmail)"),
    (14, "Duplicate name, not unique. (k_EResultDuplicateName)"),
    (15, "Access denied. (k_EResultAccessDenied)"),
    (16, "Operation timed out. (k_EResultTimeout)"),
    (17, "User is VAC banned. (k_EResultBanned)"),
    (18, "Account not found. (k_EResultAccountNotFound)"),
    (19, "Invalid SteamID. (k_EResultInvalidSteamID)"),
    (20, "Requested service is unavailable. (k_EResultServiceUnavailable)"),
    (21, "User not logged in. (k_EResultNotLoggedOn)"),
    (22, "Request is pending. (k_EResultPending)"),
    (23, "Encryption or decryption failed. (k_EResultEncryptionFailure)"),
    (24, "Insufficient privilege. (k_EResultInsufficientPrivilege)"),
    (25, "Limit exceeded. (k_EResultLimitExceeded)"),
    (26, "Access revoked. (k_EResultRevoked)"),
    (27, "Expired license or guest pass. (k_EResultExpired)"),
    (28, "Guest pass already redeemed. (k_EResultAlreadyRedeemed)"),
    (29, "Duplicate request, ignoring. (k_EResultDuplicateRequest)"),
    (30, "All requested games are already owned. (k_EResultAlreadyOwned)"),
    (31, "IP address not found. (k_EResultIPNotFound)"),
    (32, "Persist failed, unable to save changes. (k_EResultPersistFailed)"),
    (33, "Locking failed. (k_EResultLockingFailed)"),
    (34, "Logon session replaced. (k_EResultLogonSessionReplaced)"),
    (35, "Connect failed. (k_EResultConnectFailed)"),
    (36, "Handshake failed. (k_EResultHandshakeFailed)"),
    (37, "General I/O failure. (k_EResultIOFailure)"),
    (38, "Remote disconnect. (k_EResultRemoteDisconnect)"),
    (39, "Shopping cart not found. (k_EResultShoppingCartNotFound)"),
    (40, "Action blocked by the user. (k_EResultBlocked)"),
    (41, "Target is ignoring the sender. (k_EResultIgnored)"),
    (42, "No match found. (k_EResultNoMatch)"),
    (43, "Account disabled. (k_EResultAccountDisabled)"),
    (44, "Service is currently read-only. (k_EResultServiceReadOnly)"),
    (45, "Account not featured (no funds). (k_EResultAccountNotFeatured)"),
    (46, "Action allowed only because the request is from an administrator. (k_EResultAdministratorOK)"),
    (47, "Content version mismatch. (k_EResultContentVersion)"),
    (48, "Try another CM server. (k_EResultTryAnotherCM)"),
    (49, "Cached logon failed: you are already logged in elsewhere. (k_EResultPasswordRequiredToKickSession)"),
    (50, "User is logged in from another location. (Deprecated; use 6). (k_EResultAlreadyLoggedInElsewhere)"),
    (51, "Operation suspended/paused (e.g. content download). (k_EResultSuspended)"),
    (52, "Operation canceled, typically by user. (k_EResultCancelled)"),
    (53, "Operation canceled due to data corruption. (k_EResultDataCorruption)"),
    (54, "Operation canceled due to insufficient disk space. (k_EResultDiskFull)"),
    (55, "Remote or IPC call failed. (k_EResultRemoteCallFailed)"),
    (56, "Could not verify password, none is set. (k_EResultPasswordUnset)"),
    (57, "External account not linked to Steam. (k_EResultExternalAccountUnlinked)"),
    (58, "PlayStation ticket invalid. (k_EResultPSNTicketInvalid)"),
    (59, "External account already linked to another Steam account. (k_EResultExternalAccountAlreadyLinked)"),
    (60, "Remote file conflict. (k_EResultRemoteFileConflict)"),
    (61, "Illegal password. (k_EResultIllegalPassword)"),
    (62, "New value is the same as the old one. (k_EResultSameAsPreviousValue)"),
    (63, "Account logon denied (2FA error). (k_EResultAccountLogonDenied)"),
    (64, "Cannot use the old password. (k_EResultCannotUseOldPassword)"),
    (65, "Logon denied (invalid authentication code). (k_EResultInvalidLoginAuthCode)"),
    (66, "Logon denied (2FA email issue). (k_EResultAccountLogonDeniedNoMail)"),
    (67, "Hardware not capable of Intel IPT. (k_EResultHardwareNotCapableOfIPT)"),
    (68, "Intel IPT initialization failed. (k_EResultIPTInitError)"),
    (69, "Parental control restrictions in place. (k_EResultParentalControlRestricted)"),
    (70, "Facebook query returned an error. (k_EResultFacebookQueryError)"),
    (71, "Logon denied (expired authentication code). (k_EResultExpiredLoginAuthCode)"),
    (72, "IP login restriction failed. (k_EResultIPLoginRestrictionFailed)"),
    (73, "Account locked down (suspected hacking). (k_EResultAccountLockedDown)"),
    (74, "Logon denied: email not verified. (k_EResultAccountLogonDeniedVerifiedEmailRequired)"),
    (75, "No matching URL. (k_EResultNoMatchingURL)"),
    (76, "Bad response (missing field, read error, etc.). (k_EResultBadResponse)"),
    (77, "User must re-enter password. (k_EResultRequirePasswordReEntry)"),
    (78, "Value out of range. (k_EResultValueOutOfRange)"),
    (79, "Unexpected error occurred. (k_EResultUnexpectedError)"),
    (80, "Requested service is disabled. (k_EResultDisabled)"),
    (81, "Invalid CEG submission. (k_EResultInvalidCEGSubmission)"),
    (82, "Restricted device. (k_EResultRestrictedDevice)"),
    (83, "Action cannot be performed due to region lock. (k_EResultRegionLocked)"),
    (84, "Rate limit exceeded, try again later. (k_EResultRateLimitExceeded)"),
    (85, "Two-factor code required for logon. (k_EResultAccountLoginDeniedNeedTwoFactor)"),
    (86, "Requested item was deleted. (k_EResultItemDeleted)"),
    (87, "Logon denied: throttle in place (possible threat). (k_EResultAccountLoginDeniedThrottle)"),
    (88, "Two-factor code mismatch (Steam Guard). (k_EResultTwoFactorCodeMismatch)"),
    (89, "Two-factor activation code mismatch. (k_EResultTwoFactorActivationCodeMismatch)"),
    (90, "Account associated with multiple partners. (k_EResultAccountAssociatedToMultiplePartners)"),
    (91, "Data not modified. (k_EResultNotModified)"),
    (92, "No mobile device linked to this account. (k_EResultNoMobileDevice)"),
    (93, "Time not synced or out of range. (k_EResultTimeNotSynced)"),
    (94, "SMS code error. (k_EResultSmsCodeFailed)"),
    (95, "Account limit exceeded. (k_EResultAccountLimitExceeded)"),
    (96, "Too many account activity changes. (k_EResultAccountActivityLimitExceeded)"),
    (97, "Too many changes for this phone number. (k_EResultPhoneActivityLimitExceeded)"),
    (98, "Cannot refund to original payment method, refund to wallet required. (k_EResultRefundToWallet)"),
    (99, "Failed to send email. (k_EResultEmailSendFailure)"),
    (100, "Payment is not settled yet. (k_EResultNotSettled)"),
    (101, "Captcha is required. (k_EResultNeedCaptcha)"),
    (102, "GSLT token denied. (k_EResultGSLTDenied)"),
    (103, "Game server owner denied for another reason. (k_EResultGSOwnerDenied)"),
    (104, "Invalid item type. (k_EResultInvalidItemType)"),
    (105, "IP is banned from this action. (k_EResultIPBanned)"),
    (106, "GSLT has expired due to inactivity. (k_EResultGSLTExpired)"),
    (107, "Insufficient funds. (k_EResultInsufficientFunds)"),
    (108, "Too many pending requests. (k_EResultTooManyPending)"),
];

/// The code that means success.
pub const ERESULT_OK: u32 = 1;

/// Returns the catalog description of `code`, if it is known.
pub fn describe(code: u32) -> Option<&'static str> {
    ERESULTS
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .map(|idx| ERESULTS[idx].1)
}

/// Renders a login failure message for `code`.
///
/// Unknown codes get a generic message instead of failing the lookup.
pub fn failure_message(code: u32) -> String {
    match describe(code) {
        Some(text) => format!("login failed, eResult={code}: {text}"),
        None => format!("login failed, unknown eResult={code}"),
    }
}
