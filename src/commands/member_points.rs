use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{available_points, MemberPoints, Transaction, UsageLogEntry},
    ports::{database::DatabasePort, member::MemberPort},
};

use super::{DomainLogic, Error};

impl<D, M, P> DomainLogic<D, M, P>
where
    D: DatabasePort,
    M: MemberPort,
{
    /// Remaining points across the member's unexpired lots
    pub async fn sum_available(&self, member_id: Uuid) -> Result<u64, Error> {
        let member = self.member.get_member(member_id).await?;
        let lots = self.database.find_lots_for_member(member.member_id).await?;

        Ok(available_points(&lots, Utc::now()))
    }

    pub async fn member_points(&self, member_id: Uuid) -> Result<MemberPoints, Error> {
        let member = self.member.get_member(member_id).await?;
        let balance = self
            .database
            .find_balance_for_member(member.member_id)
            .await?
            .ok_or(Error::BalanceNotFound(member.member_id))?;
        let lots = self.database.find_lots_for_member(member.member_id).await?;

        Ok(MemberPoints {
            member_id: member.member_id,
            tier: member.tier,
            total_points: balance.total_points,
            available_points: available_points(&lots, Utc::now()),
        })
    }

    /// Point transactions of the member, newest first
    pub async fn transaction_history(&self, member_id: Uuid) -> Result<Vec<Transaction>, Error> {
        let member = self.member.get_member(member_id).await?;
        let mut transactions = self
            .database
            .find_transactions_for_member(member.member_id)
            .await?;

        // Stable sort on the reversed list keeps later inserts first on equal timestamps
        transactions.reverse();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(transactions)
    }

    /// Privilege usage log of the member, oldest first
    pub async fn usage_history(&self, member_id: Uuid) -> Result<Vec<UsageLogEntry>, Error> {
        let member = self.member.get_member(member_id).await?;
        Ok(self.database.find_usage_for_member(member.member_id).await?)
    }
}
